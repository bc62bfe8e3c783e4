//! Audit logging
//!
//! One record per query run and per dataset upload. Records are JSON
//! lines in an append-only file. Sinks are fire-and-forget from the
//! engine's point of view: a failed append is logged, never surfaced.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "query.run")]
    QueryRun,
    #[serde(rename = "dataset.upload")]
    DatasetUpload,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::QueryRun => "query.run",
            AuditAction::DatasetUpload => "dataset.upload",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    /// Refused before execution (validation, permission)
    Rejected,
    /// Failed during execution or I/O
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Rejected => "rejected",
            AuditOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    /// Caller user id, `anonymous` when the gateway sent none
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<u64>,
    /// `hit`, `miss` or `coalesced` for query runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Stable error code for rejected or failed actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, outcome: AuditOutcome, actor: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            outcome,
            actor: actor.into(),
            dataset_id: None,
            cache: None,
            fingerprint: None,
            error_code: None,
        }
    }

    pub fn with_dataset(mut self, id: u64) -> Self {
        self.dataset_id = Some(id);
        self
    }

    pub fn with_cache(mut self, status: impl Into<String>) -> Self {
        self.cache = Some(status.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Serialize to a single JSON line
    pub fn to_json(&self) -> io::Result<String> {
        serde_json::to_string(self).map_err(io::Error::other)
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Append a record. The record is durable once this returns `Ok`.
    fn append(&self, record: &AuditRecord) -> io::Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> io::Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::other("audit log lock poisoned"))
}

/// Append-only JSON-lines audit file, fsynced per record
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditLog {
    /// Open or create an audit log file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let json = record.to_json()?;
        let mut writer = lock(&self.writer)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }
}

/// In-memory audit log for testing.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        lock(&self.records)?.push(record.clone());
        Ok(())
    }
}

/// Discards every record; used when no audit path is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditLog;

impl AuditSink for NullAuditLog {
    fn append(&self, _record: &AuditRecord) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_record_json_shape() {
        let record = AuditRecord::new(AuditAction::QueryRun, AuditOutcome::Success, "u1")
            .with_dataset(3)
            .with_cache("hit");

        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(value["action"], "query.run");
        assert_eq!(value["outcome"], "success");
        assert_eq!(value["actor"], "u1");
        assert_eq!(value["dataset_id"], 3);
        assert_eq!(value["cache"], "hit");
        assert!(value.get("error_code").is_none());
    }

    #[test]
    fn test_file_audit_log_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");
        let log = FileAuditLog::open(&path).unwrap();

        log.append(&AuditRecord::new(AuditAction::DatasetUpload, AuditOutcome::Success, "u1"))
            .unwrap();
        log.append(
            &AuditRecord::new(AuditAction::QueryRun, AuditOutcome::Rejected, "u2")
                .with_error_code("QUERY_UNKNOWN_COLUMN"),
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.action, AuditAction::QueryRun);
        assert_eq!(second.error_code.as_deref(), Some("QUERY_UNKNOWN_COLUMN"));
    }

    #[test]
    fn test_file_audit_log_reopen_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let log = FileAuditLog::open(&path).unwrap();
            log.append(&AuditRecord::new(AuditAction::QueryRun, AuditOutcome::Success, "a"))
                .unwrap();
        }
        let log = FileAuditLog::open(&path).unwrap();
        log.append(&AuditRecord::new(AuditAction::QueryRun, AuditOutcome::Failed, "b"))
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_memory_audit_log() {
        let log = MemoryAuditLog::new();
        assert!(log.is_empty());

        log.append(&AuditRecord::new(AuditAction::QueryRun, AuditOutcome::Success, "x"))
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].actor, "x");
    }
}
