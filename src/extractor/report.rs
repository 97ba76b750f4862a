use crate::error::{PodExtractError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const REPORT_FILE_NAME: &str = "podextract-report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DirectoryCreate,
    Copy,
    DestinationExists,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::DirectoryCreate => "directory",
            FailureKind::Copy => "copy",
            FailureKind::DestinationExists => "exists",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: FailureKind,
    pub reason: String,
}

impl FailedEntry {
    /// Builds a failure record from the error an entry produced.
    pub fn from_error(source: &Path, destination: &Path, error: &PodExtractError) -> Self {
        let (kind, reason) = match error {
            PodExtractError::DirectoryCreate { message, .. } => {
                (FailureKind::DirectoryCreate, message.clone())
            }
            PodExtractError::Copy { message, .. } => (FailureKind::Copy, message.clone()),
            other => (FailureKind::Copy, other.to_string()),
        };

        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            kind,
            reason,
        }
    }

    pub fn destination_exists(source: &Path, destination: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            kind: FailureKind::DestinationExists,
            reason: "destination exists".to_string(),
        }
    }
}

/// Outcome of applying a plan to a destination root.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub destination_root: PathBuf,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FailedEntry>,
    pub bytes_copied: u64,
    pub duration: Duration,
    pub cancelled: bool,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn new(destination_root: PathBuf) -> Self {
        Self {
            destination_root,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            bytes_copied: 0,
            duration: Duration::ZERO,
            cancelled: false,
            finished_at: Utc::now(),
        }
    }

    pub fn record_success(&mut self, bytes: u64) {
        self.succeeded += 1;
        self.bytes_copied += bytes;
    }

    pub fn record_failure(&mut self, failure: FailedEntry) {
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    pub(crate) fn finish(&mut self, duration: Duration) {
        self.duration = duration;
        self.finished_at = Utc::now();
    }

    /// Writes the report as pretty JSON next to the extracted files.
    pub fn save_json(&self) -> Result<PathBuf> {
        let report_path = self.destination_root.join(REPORT_FILE_NAME);
        let json_content =
            serde_json::to_string_pretty(self).map_err(|e| PodExtractError::Config {
                message: format!("Failed to serialize report to JSON: {}", e),
            })?;

        fs::write(&report_path, json_content)?;
        Ok(report_path)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
