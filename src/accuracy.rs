// src/accuracy.rs
//
// Running agreement between estimated and ground-truth steering.

use crate::types::SteeringEstimate;
use serde::Serialize;
use std::time::Instant;

/// Frames seen and frames within tolerance. Only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccuracyCounter {
    pub frames_seen: u64,
    pub frames_within_tolerance: u64,
}

impl AccuracyCounter {
    /// `within / seen`, or None before the first frame.
    pub fn percentage(&self) -> Option<f64> {
        if self.frames_seen == 0 {
            return None;
        }
        Some(self.frames_within_tolerance as f64 / self.frames_seen as f64)
    }
}

#[derive(Debug, Clone)]
pub struct AccuracyAggregator {
    tolerance: f64,
    counter: AccuracyCounter,
}

impl AccuracyAggregator {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            counter: AccuracyCounter::default(),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn is_within_tolerance(&self, estimate: f64, ground_truth: f64) -> bool {
        (estimate - ground_truth).abs() < self.tolerance
    }

    /// Count one frame. Returns whether it was within tolerance.
    pub fn record(&mut self, estimate: f64, ground_truth: f64) -> bool {
        let correct = self.is_within_tolerance(estimate, ground_truth);
        self.counter.frames_seen += 1;
        if correct {
            self.counter.frames_within_tolerance += 1;
        }
        correct
    }

    pub fn record_estimate(&mut self, estimate: &SteeringEstimate, ground_truth: f64) -> bool {
        self.record(estimate.angle.value(), ground_truth)
    }

    pub fn counter(&self) -> AccuracyCounter {
        self.counter
    }

    pub fn percentage(&self) -> Option<f64> {
        self.counter.percentage()
    }
}

/// Emitted once at shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_frames: u64,
    pub frames_within_tolerance: u64,
    /// None (null in JSON) when no frame was processed.
    pub percentage: Option<f64>,
    pub frozen_frames: u64,
    pub frames_with_blue: u64,
    pub frames_with_yellow: u64,
    pub ground_truth_samples: u64,
    pub elapsed_secs: f64,
}

/// Side counters collected next to the accuracy tally.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub frozen_frames: u64,
    pub frames_with_blue: u64,
    pub frames_with_yellow: u64,
    pub started_at: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            frozen_frames: 0,
            frames_with_blue: 0,
            frames_with_yellow: 0,
            started_at: Instant::now(),
        }
    }
}

impl RunStats {
    pub fn summary(&self, accuracy: &AccuracyAggregator, ground_truth_samples: u64) -> RunSummary {
        let counter = accuracy.counter();
        RunSummary {
            total_frames: counter.frames_seen,
            frames_within_tolerance: counter.frames_within_tolerance,
            percentage: counter.percentage(),
            frozen_frames: self.frozen_frames,
            frames_with_blue: self.frames_with_blue,
            frames_with_yellow: self.frames_with_yellow,
            ground_truth_samples,
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl RunSummary {
    pub fn percentage_label(&self) -> String {
        match self.percentage {
            Some(p) => format!("{:.1}%", p * 100.0),
            None => "n/a (no frames)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_frames_is_no_data() {
        let agg = AccuracyAggregator::new(0.05);
        assert_eq!(agg.percentage(), None);
        let summary = RunStats::default().summary(&agg, 0);
        assert_eq!(summary.percentage, None);
        assert_eq!(summary.percentage_label(), "n/a (no frames)");
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["percentage"].is_null());
    }

    #[test]
    fn test_percentage_is_exact_ratio() {
        let mut agg = AccuracyAggregator::new(0.05);
        let pairs = [
            (0.1, 0.12),   // in
            (-0.2, -0.2),  // in
            (0.0, 0.3),    // out
            (0.25, 0.21),  // in
            (-0.1, 0.1),   // out
            (0.0, -0.049), // in
            (0.2, 0.0),    // out
        ];
        let hits = pairs
            .iter()
            .filter(|&&(e, g)| agg.record(e, g))
            .count();
        assert_eq!(hits, 4);
        assert_eq!(agg.counter().frames_seen, 7);
        assert_eq!(agg.percentage(), Some(4.0 / 7.0));
    }

    #[test]
    fn test_tolerance_is_strict() {
        let agg = AccuracyAggregator::new(0.25);
        assert!(!agg.is_within_tolerance(0.25, 0.0));
        assert!(agg.is_within_tolerance(0.2, 0.0));
    }

    #[test]
    fn test_counters_never_decrease() {
        let mut agg = AccuracyAggregator::new(0.05);
        let mut last = agg.counter();
        for i in 0..20 {
            agg.record(0.0, i as f64 * 0.01);
            let now = agg.counter();
            assert!(now.frames_seen > last.frames_seen);
            assert!(now.frames_within_tolerance >= last.frames_within_tolerance);
            last = now;
        }
    }
}
