//! Result files
//!
//! Measurement runs are written as comma-separated text, one row per
//! iteration; images as raw bytes. A JSON summary collects the outcome of a
//! whole run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::gps::Pin;
use crate::stats::{Outcome, Statistics, StatsKind, StatsRecord, StatsSummary};

/// Placeholder for columns without a value
pub const PLACEHOLDER: &str = "---";

/// File name of the echo statistics
pub const ECHO_REPORT: &str = "echo.csv";

/// File name of the ARQ statistics
pub const ARQ_REPORT: &str = "arq.csv";

/// File name of the run summary
pub const SUMMARY_REPORT: &str = "summary.json";

/// Format one statistics row, without the trailing newline
pub fn format_row(kind: StatsKind, record: &StatsRecord) -> String {
    match (kind, record.outcome) {
        (StatsKind::Echo, Outcome::Delivered { latency_ms }) => format!(
            "Packet #{}, Response Time:, {}, ms, {}",
            record.sequence, latency_ms, record.message
        ),
        (StatsKind::Arq, Outcome::Delivered { latency_ms }) => format!(
            "Packet #{}, Response Time:, {}, ms, Number of Fails: {}, {}",
            record.sequence,
            latency_ms,
            record.fail_count.unwrap_or(0),
            record.message
        ),
        (_, Outcome::Failed) => format!(
            "Failed attempt for packet #{}, {}, {}, {}",
            record.sequence, PLACEHOLDER, PLACEHOLDER, record.message
        ),
    }
}

/// Write every record of `stats` to `path`
pub fn write_statistics<P: AsRef<Path>>(path: P, stats: &Statistics) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for record in &stats.records {
        writeln!(writer, "{}", format_row(stats.kind, record))?;
    }

    writer.flush()?;
    Ok(())
}

/// Write raw image bytes to `path`
pub fn write_image<P: AsRef<Path>>(path: P, image: &[u8]) -> io::Result<()> {
    fs::write(path, image)
}

/// Make sure the output directory exists
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// What one operation of a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationSummary {
    Echo {
        stats: StatsSummary,
        artifact: Option<PathBuf>,
    },
    Arq {
        stats: StatsSummary,
        artifact: Option<PathBuf>,
    },
    Image {
        name: String,
        bytes: usize,
        complete: bool,
        artifact: Option<PathBuf>,
    },
    Gps {
        samples: usize,
        pins: Vec<Pin>,
        request: String,
    },
}

/// Summary of a full run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub operations: Vec<OperationSummary>,
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            operations: Vec::new(),
        }
    }

    pub fn push(&mut self, operation: OperationSummary) {
        self.operations.push(operation);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Write the summary as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(sequence: u32, outcome: Outcome, fail_count: Option<u32>) -> StatsRecord {
        StatsRecord {
            sequence,
            outcome,
            fail_count,
            message: "PSTART 01 PSTOP".to_string(),
        }
    }

    #[test]
    fn test_echo_row() {
        let row = format_row(
            StatsKind::Echo,
            &record(3, Outcome::Delivered { latency_ms: 42 }, None),
        );
        assert_eq!(row, "Packet #3, Response Time:, 42, ms, PSTART 01 PSTOP");
    }

    #[test]
    fn test_arq_rows() {
        let ok = format_row(
            StatsKind::Arq,
            &record(7, Outcome::Delivered { latency_ms: 250 }, Some(2)),
        );
        assert_eq!(
            ok,
            "Packet #7, Response Time:, 250, ms, Number of Fails: 2, PSTART 01 PSTOP"
        );

        let failed = format_row(StatsKind::Arq, &record(7, Outcome::Failed, Some(1)));
        assert_eq!(failed, "Failed attempt for packet #7, ---, ---, PSTART 01 PSTOP");
    }

    #[test]
    fn test_write_statistics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(ECHO_REPORT);
        let mut stats = Statistics::new(StatsKind::Echo);
        stats
            .records
            .push(record(1, Outcome::Delivered { latency_ms: 10 }, None));
        stats
            .records
            .push(record(2, Outcome::Delivered { latency_ms: 12 }, None));

        write_statistics(&path, &stats).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Packet #1, Response Time:, 10, ms, PSTART 01 PSTOP\n\
             Packet #2, Response Time:, 12, ms, PSTART 01 PSTOP\n"
        );
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join(ARQ_REPORT);
        let stats = Statistics::new(StatsKind::Arq);
        assert!(write_statistics(&path, &stats).is_err());
    }

    #[test]
    fn test_summary_round_trips_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SUMMARY_REPORT);

        let mut summary = RunSummary::start();
        summary.push(OperationSummary::Image {
            name: "image".into(),
            bytes: 1024,
            complete: true,
            artifact: Some(dir.path().join("image.jpg")),
        });
        summary.finish();
        summary.save(&path).unwrap();

        let loaded: RunSummary =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.operations.len(), 1);
        assert!(loaded.finished_at.is_some());
        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"operation\": \"image\""));
    }
}
