//! Operational audit log for `/operations/*` and `/memory/lanes/*` actions.
//!
//! Append-only JSONL under `<HALO_HOME>/audit/operational.jsonl`, in the same
//! shape as `sa_sessions::TranscriptWriter`: one mutex-guarded file, one
//! line per event, never truncated or rewritten.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

/// The actions the operational audit log names, per the admin handler
/// surface's authorization model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    LaneExport,
    LaneDelete,
    LaneRetention,
    BackupCreate,
    BackupRestore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allow,
    Deny,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
struct AuditRecord {
    timestamp: String,
    action: AuditAction,
    outcome: AuditOutcome,
    member_id: Option<String>,
    scope_id: Option<String>,
    lane_id: Option<String>,
    message: Option<String>,
}

pub struct AuditLog {
    path: Mutex<PathBuf>,
}

impl AuditLog {
    pub fn new(audit_dir: impl AsRef<Path>) -> Self {
        Self {
            path: Mutex::new(audit_dir.as_ref().join("operational.jsonl")),
        }
    }

    /// Append one audit record. Failures are logged, not propagated — a
    /// broken audit log must never block the operation it is recording.
    pub fn record(
        &self,
        action: AuditAction,
        outcome: AuditOutcome,
        member_id: Option<&str>,
        scope_id: Option<&str>,
        lane_id: Option<&str>,
        message: Option<&str>,
    ) {
        let record = AuditRecord {
            timestamp: Utc::now().to_rfc3339(),
            action,
            outcome,
            member_id: member_id.map(str::to_owned),
            scope_id: scope_id.map(str::to_owned),
            lane_id: lane_id.map(str::to_owned),
            message: message.map(str::to_owned),
        };

        let path = self.path.lock().unwrap();
        let line = match serde_json::to_string(&record) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize audit record");
                return;
            }
        };

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&*path)
            .and_then(|mut f| writeln!(f, "{line}"));

        if let Err(e) = result {
            tracing::warn!(error = %e, path = %path.display(), "failed to append audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        log.record(
            AuditAction::LaneExport,
            AuditOutcome::Allow,
            Some("wags"),
            None,
            Some("shared"),
            None,
        );
        let contents = std::fs::read_to_string(dir.path().join("operational.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("lane_export"));
        assert!(contents.contains("\"allow\""));
    }
}
