// src/recording.rs
//
// Per-frame CSV records and the end-of-run JSON summary.

use crate::accuracy::RunSummary;
use crate::types::FrameRecord;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct RecordWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: u64,
}

impl RecordWriter {
    /// Create (truncate) the CSV file. The header row is written with the first record.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        info!("💾 Frame records will be written to: {}", path.display());
        Ok(Self {
            writer,
            path,
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &FrameRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .with_context(|| format!("Failed to write record to {}", self.path.display()))?;
        self.rows += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

pub fn write_summary(path: impl AsRef<Path>, summary: &RunSummary) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("💾 Summary written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accuracy::{AccuracyAggregator, RunStats};

    #[test]
    fn test_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("steering.csv");
        let mut writer = RecordWriter::create(&path).unwrap();
        writer
            .write(&FrameRecord {
                timestamp_us: 1_000_050,
                ground_truth: 0.0,
                estimated_angle: -0.1,
            })
            .unwrap();
        assert_eq!(writer.finish().unwrap(), 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp_us,ground_truth,estimated_angle")
        );
        assert_eq!(lines.next(), Some("1000050,0.0,-0.1"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_summary_json_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let mut agg = AccuracyAggregator::new(0.05);
        agg.record(0.1, 0.1);
        agg.record(0.1, -0.1);
        write_summary(&path, &RunStats::default().summary(&agg, 3)).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["total_frames"], 2);
        assert_eq!(v["frames_within_tolerance"], 1);
        assert_eq!(v["percentage"], 0.5);
        assert_eq!(v["ground_truth_samples"], 3);
    }
}
