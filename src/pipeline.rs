// src/pipeline.rs
//
// One synchronous pass per frame:
//   detect -> resolve orientation -> map angle -> score against ground truth
//
// and the loop that feeds it from the shared frame buffer until the session
// stops or the producer closes the buffer.

use crate::accuracy::{AccuracyAggregator, RunStats, RunSummary};
use crate::detector::{ColorMarkerDetector, FrameDetections, MarkerDetector};
use crate::direction::DirectionTracker;
use crate::frame_source::{FrameWait, SharedFrameBuffer};
use crate::ground_truth::GroundTruthCell;
use crate::overlay::AnnotatedWriter;
use crate::recording::RecordWriter;
use crate::session::Session;
use crate::steering::SteeringAngleMapper;
use crate::types::{Config, Frame, FrameRecord, MarkerPair, SteeringEstimate};
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long one wait on the buffer lasts before liveness is re-checked.
const FRAME_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub estimate: SteeringEstimate,
    pub record: FrameRecord,
    pub within_tolerance: bool,
}

pub struct SteeringPipeline<D: MarkerDetector = ColorMarkerDetector> {
    detector: D,
    mapper: SteeringAngleMapper,
    tracker: DirectionTracker,
    accuracy: AccuracyAggregator,
    stats: RunStats,
}

impl SteeringPipeline<ColorMarkerDetector> {
    pub fn from_config(config: &Config) -> Self {
        Self::with_detector(ColorMarkerDetector::new(config), config)
    }
}

impl<D: MarkerDetector> SteeringPipeline<D> {
    pub fn with_detector(detector: D, config: &Config) -> Self {
        Self {
            detector,
            mapper: SteeringAngleMapper::new(config.zones.clone()),
            tracker: DirectionTracker::new(),
            accuracy: AccuracyAggregator::new(config.accuracy.tolerance),
            stats: RunStats::default(),
        }
    }

    pub fn tracker(&self) -> &DirectionTracker {
        &self.tracker
    }

    pub fn accuracy(&self) -> &AccuracyAggregator {
        &self.accuracy
    }

    /// Full pass over one frame. Never fails; missing cones are sentinels.
    pub fn process(
        &mut self,
        frame: &Frame,
        ground_truth: f64,
    ) -> (FrameOutcome, FrameDetections) {
        let detections = self.detector.detect(frame);
        let outcome =
            self.process_markers(detections.markers, frame.timestamp_us, ground_truth);
        (outcome, detections)
    }

    /// Everything after detection, for callers that already have centroids.
    pub fn process_markers(
        &mut self,
        markers: MarkerPair,
        timestamp_us: i64,
        ground_truth: f64,
    ) -> FrameOutcome {
        if markers.blue.is_defined() {
            self.stats.frames_with_blue += 1;
        }
        if markers.yellow.is_defined() {
            self.stats.frames_with_yellow += 1;
        }

        let estimate = self.tracker.update(markers, &self.mapper, timestamp_us);
        if estimate.is_frozen() {
            self.stats.frozen_frames += 1;
        }

        let within_tolerance = self.accuracy.record_estimate(&estimate, ground_truth);

        FrameOutcome {
            estimate,
            record: FrameRecord {
                timestamp_us,
                ground_truth,
                estimated_angle: estimate.angle.value(),
            },
            within_tolerance,
        }
    }

    pub fn summary(&self, ground_truth_samples: u64) -> RunSummary {
        self.stats.summary(&self.accuracy, ground_truth_samples)
    }
}

// ============================================================================
// PROCESSING LOOP
// ============================================================================

/// Optional outputs written as frames are processed.
#[derive(Default)]
pub struct PipelineSinks {
    pub records: Option<RecordWriter>,
    pub annotated: Option<AnnotatedWriter>,
    /// Per-frame line at info instead of debug.
    pub verbose: bool,
}

/// Closes the buffer on every exit path so the producer never waits on a
/// consumer that has gone away.
struct CloseOnExit<'a>(&'a SharedFrameBuffer);

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Consume frames until the session stops or the buffer is closed and drained.
/// A frame that has been copied out is always finished. Returns frames processed.
pub fn run_loop<D: MarkerDetector>(
    pipeline: &mut SteeringPipeline<D>,
    buffer: &SharedFrameBuffer,
    ground_truth: &GroundTruthCell,
    session: &Session,
    sinks: &mut PipelineSinks,
) -> Result<u64> {
    let _close = CloseOnExit(buffer);
    let mut last_sequence = 0;
    let mut processed = 0u64;

    while session.is_running() {
        match buffer.wait_for_frame(last_sequence, FRAME_POLL) {
            FrameWait::Ready(_) => {}
            FrameWait::TimedOut => continue,
            FrameWait::Closed => {
                info!("Frame source closed");
                break;
            }
        }
        // Sampled before the frame is taken, while the producer is still parked.
        let gt = ground_truth.latest_or_default();
        let (sequence, frame) = match buffer.copy_out(last_sequence, FRAME_POLL) {
            Ok(taken) => taken,
            Err(_) => continue,
        };
        if sequence > last_sequence + 1 && last_sequence > 0 {
            debug!("Skipped {} frames", sequence - last_sequence - 1);
        }
        last_sequence = sequence;

        let (outcome, detections) = pipeline.process(&frame, gt);
        processed += 1;

        if sinks.verbose {
            info!("{}; {:.2}", outcome.record.timestamp_us, outcome.record.estimated_angle);
        } else {
            debug!(
                "{}; {:.2} (gt {:.3}, ok={})",
                outcome.record.timestamp_us,
                outcome.record.estimated_angle,
                gt,
                outcome.within_tolerance
            );
        }

        if let Some(records) = sinks.records.as_mut() {
            records.write(&outcome.record)?;
        }
        if let Some(annotated) = sinks.annotated.as_mut() {
            if let Err(e) = annotated.save(&frame, &detections, &outcome.record) {
                warn!("Annotated frame not saved: {:#}", e);
            }
        }
    }

    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Orientation, SteeringAngle};

    #[test]
    fn test_first_frame_is_frozen_at_straight() {
        let mut p = SteeringPipeline::from_config(&Config::default());
        let out = p.process_markers(MarkerPair::new(300.0, 0.0), 1, 0.0);
        assert!(out.estimate.is_frozen());
        assert_eq!(out.record.estimated_angle, 0.0);
        assert!(out.within_tolerance);
    }

    #[test]
    fn test_clockwise_blue_in_left_band() {
        let mut p = SteeringPipeline::from_config(&Config::default());
        p.process_markers(MarkerPair::new(300.0, 0.0), 1, 0.0);
        let out = p.process_markers(MarkerPair::new(200.0, 500.0), 2, -0.1);
        assert_eq!(out.estimate.orientation, Some(Orientation::Clockwise));
        assert_eq!(out.estimate.angle, SteeringAngle::Right);
        assert!(out.within_tolerance);
    }

    #[test]
    fn test_summary_counts_side_stats() {
        let mut p = SteeringPipeline::from_config(&Config::default());
        p.process_markers(MarkerPair::undefined(), 1, 0.0);
        p.process_markers(MarkerPair::new(300.0, 0.0), 2, 0.2);
        p.process_markers(MarkerPair::new(250.0, 400.0), 3, 0.0);

        let s = p.summary(0);
        assert_eq!(s.total_frames, 3);
        assert_eq!(s.frozen_frames, 2);
        assert_eq!(s.frames_with_blue, 2);
        assert_eq!(s.frames_with_yellow, 1);
    }

    #[test]
    fn test_loop_exits_on_closed_buffer_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = SharedFrameBuffer::new();
        buffer.publish(Frame {
            data: vec![0; 640 * 480 * 3],
            width: 640,
            height: 480,
            layout: crate::types::PixelLayout::Rgb8,
            timestamp_us: 77,
        });
        buffer.close();

        let cell = GroundTruthCell::new();
        cell.store(0.02);
        let mut sinks = PipelineSinks {
            records: Some(RecordWriter::create(dir.path().join("r.csv")).unwrap()),
            ..Default::default()
        };
        let mut p = SteeringPipeline::from_config(&Config::default());
        let n = run_loop(&mut p, &buffer, &cell, &Session::new(), &mut sinks).unwrap();

        assert_eq!(n, 1);
        assert_eq!(p.accuracy().counter().frames_within_tolerance, 1);
        assert_eq!(sinks.records.take().unwrap().finish().unwrap(), 1);
    }

    #[test]
    fn test_loop_does_not_start_when_session_stopped() {
        let buffer = SharedFrameBuffer::new();
        let session = Session::new();
        session.stop();
        let mut p = SteeringPipeline::from_config(&Config::default());
        let n = run_loop(
            &mut p,
            &buffer,
            &GroundTruthCell::new(),
            &session,
            &mut PipelineSinks::default(),
        )
        .unwrap();
        assert_eq!(n, 0);
        assert!(buffer.is_closed());
    }
}
