//! CSV audit trail and run identity.
//!
//! Every arrival is appended to a test-bed CSV so a run can be replayed or
//! analyzed offline; the run id itself is persisted to a marker file that
//! external tooling reads to find this run's metric series.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One row per arrival.
#[derive(Debug, Clone)]
pub struct ArrivalRecord {
    pub task_id: String,
    pub priority: u8,
    pub color: String,
    pub exec_time_secs: u64,
    pub arrival_time: u64,
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

/// Append-only CSV audit log.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &ArrivalRecord) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            record.task_id,
            record.priority,
            record.color,
            record.exec_time_secs,
            record.arrival_time,
            record.cpu_millicores,
            record.memory_bytes,
        )
    }
}

/// Persist the run identity so external tooling can find this run.
pub fn write_simulation_id(path: impl AsRef<Path>, run_id: &str) -> std::io::Result<()> {
    std::fs::write(path, run_id)
}
