// src/ground_truth.rs
//
// Latest-wins ground-truth steering shared between the message callback and
// the processing loop. The value lives in a single atomic word, so neither
// side ever blocks the other and a read always sees one complete sample.

use crate::types::GroundTruthSample;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Quiet NaN with a payload no arithmetic produces; marks "nothing received yet".
const EMPTY_BITS: u64 = 0x7ff8_dead_beef_0001;

#[derive(Debug)]
pub struct GroundTruthCell {
    bits: AtomicU64,
    received: AtomicU64,
}

impl Default for GroundTruthCell {
    fn default() -> Self {
        Self {
            bits: AtomicU64::new(EMPTY_BITS),
            received: AtomicU64::new(0),
        }
    }
}

impl GroundTruthCell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Overwrite the held value. Non-finite values are dropped.
    pub fn store(&self, value: f64) -> bool {
        if !value.is_finite() {
            warn!("Ignoring non-finite ground truth value {}", value);
            return false;
        }
        self.bits.store(value.to_bits(), Ordering::Release);
        self.received.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn latest(&self) -> Option<f64> {
        let bits = self.bits.load(Ordering::Acquire);
        (bits != EMPTY_BITS).then(|| f64::from_bits(bits))
    }

    /// Latest value, or 0.0 before the first sample (a default steering request).
    pub fn latest_or_default(&self) -> f64 {
        self.latest().unwrap_or(0.0)
    }

    pub fn samples_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// One message off the vehicle bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub data_type: u32,
    pub sample_time_us: i64,
    pub value: f64,
}

/// Filters envelopes by message id and forwards matching values to the cell.
#[derive(Debug, Clone)]
pub struct GroundTruthFeed {
    cell: Arc<GroundTruthCell>,
    message_id: u32,
}

impl GroundTruthFeed {
    pub fn new(cell: Arc<GroundTruthCell>, message_id: u32) -> Self {
        Self { cell, message_id }
    }

    pub fn cell(&self) -> &Arc<GroundTruthCell> {
        &self.cell
    }

    pub fn on_envelope(&self, envelope: Envelope) -> bool {
        if envelope.data_type != self.message_id {
            return false;
        }
        debug!(
            "ground steering = {:.3} @ {}",
            envelope.value, envelope.sample_time_us
        );
        self.cell.store(envelope.value)
    }

    pub fn on_sample(&self, sample: &GroundTruthSample) -> bool {
        self.on_envelope(Envelope {
            data_type: self.message_id,
            sample_time_us: sample.timestamp_us,
            value: sample.value,
        })
    }
}

/// Read `timestamp_us,value` rows, sorted by timestamp. Lines starting with `#` are skipped.
pub fn load_ground_truth_csv(path: impl AsRef<Path>) -> Result<Vec<GroundTruthSample>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut samples = Vec::new();
    for row in rdr.deserialize() {
        let sample: GroundTruthSample =
            row.with_context(|| format!("Bad ground truth row in {}", path.display()))?;
        samples.push(sample);
    }
    samples.sort_by_key(|s| s.timestamp_us);
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GROUND_STEERING_REQUEST_ID;
    use std::io::Write;
    use std::thread;

    #[test]
    fn test_empty_until_first_store() {
        let cell = GroundTruthCell::new();
        assert_eq!(cell.latest(), None);
        assert_eq!(cell.latest_or_default(), 0.0);
        assert!(cell.store(-0.12));
        assert_eq!(cell.latest(), Some(-0.12));
    }

    #[test]
    fn test_latest_wins() {
        let cell = GroundTruthCell::new();
        for v in [0.1, 0.2, -0.05] {
            cell.store(v);
        }
        assert_eq!(cell.latest(), Some(-0.05));
        assert_eq!(cell.samples_received(), 3);
    }

    #[test]
    fn test_rejects_non_finite() {
        let cell = GroundTruthCell::new();
        cell.store(0.2);
        assert!(!cell.store(f64::NAN));
        assert!(!cell.store(f64::INFINITY));
        assert_eq!(cell.latest(), Some(0.2));
    }

    #[test]
    fn test_feed_filters_by_message_id() {
        let feed = GroundTruthFeed::new(GroundTruthCell::new(), GROUND_STEERING_REQUEST_ID);
        assert!(!feed.on_envelope(Envelope {
            data_type: 1055,
            sample_time_us: 1,
            value: 0.3,
        }));
        assert_eq!(feed.cell().latest(), None);
        assert!(feed.on_envelope(Envelope {
            data_type: GROUND_STEERING_REQUEST_ID,
            sample_time_us: 2,
            value: 0.1,
        }));
        assert_eq!(feed.cell().latest(), Some(0.1));
    }

    #[test]
    fn test_concurrent_writer_never_tears() {
        let cell = GroundTruthCell::new();
        let writer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for i in 0..10_000 {
                    cell.store(if i % 2 == 0 { 0.25 } else { -0.25 });
                }
            })
        };
        for _ in 0..10_000 {
            if let Some(v) = cell.latest() {
                assert!(v == 0.25 || v == -0.25);
            }
        }
        writer.join().unwrap();
        assert_eq!(cell.samples_received(), 10_000);
    }

    #[test]
    fn test_load_csv_sorts_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp_us,value").unwrap();
        writeln!(file, "# recorded run").unwrap();
        writeln!(file, "200, 0.1").unwrap();
        writeln!(file, "100, -0.05").unwrap();
        let samples = load_ground_truth_csv(file.path()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].timestamp_us, 100);
        assert_eq!(samples[1].value, 0.1);
    }
}
