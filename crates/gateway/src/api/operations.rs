//! `/operations/backup/*` and `/memory/lanes/{laneId}/*` — both additionally
//! gated on an operational manager `memberId`, with every allow/deny/fail
//! outcome written to the operational audit log.

use std::path::{Path, PathBuf};

use axum::extract::{Path as AxPath, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::api::auth::require_operational_manager;
use crate::api::error::{internal_error, not_found};
use crate::audit::{AuditAction, AuditOutcome};
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct ManagerQuery {
    #[serde(rename = "memberId")]
    member_id: Option<String>,
}

fn audited<'a>(
    state: &AppState,
    action: AuditAction,
    member_id: Option<&'a str>,
) -> Result<&'a str, Response> {
    match require_operational_manager(state, member_id) {
        Ok(id) => Ok(id),
        Err((response, reason)) => {
            state
                .services
                .audit
                .record(action, AuditOutcome::Deny, member_id, None, None, Some(reason));
            Err(response)
        }
    }
}

// ── Backups ───────────────────────────────────────────────────────────

pub async fn backup_create(State(state): State<AppState>, Query(query): Query<ManagerQuery>) -> Response {
    let member_id = match audited(&state, AuditAction::BackupCreate, query.member_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let backup_id = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
    let dest = state.config.workspace.root.join("backups").join(&backup_id);

    let sources = [
        state.config.workspace.sessions_dir(),
        state.config.workspace.transcripts_dir(),
        state.config.workspace.memory_scopes_dir(),
        state.config.workspace.file_memory_dir(),
        state.config.workspace.config_dir(),
    ];

    let result = (|| -> std::io::Result<()> {
        std::fs::create_dir_all(&dest)?;
        for src in &sources {
            if !src.exists() {
                continue;
            }
            let name = src.file_name().unwrap_or_default();
            copy_dir_recursive(src, &dest.join(name))?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            state.services.audit.record(
                AuditAction::BackupCreate,
                AuditOutcome::Allow,
                Some(member_id),
                None,
                None,
                Some(&backup_id),
            );
            Json(json!({ "ok": true, "backupId": backup_id })).into_response()
        }
        Err(e) => {
            state.services.audit.record(
                AuditAction::BackupCreate,
                AuditOutcome::Fail,
                Some(member_id),
                None,
                None,
                Some(&e.to_string()),
            );
            internal_error(&e.to_string())
        }
    }
}

#[derive(serde::Deserialize)]
pub struct RestoreQuery {
    #[serde(rename = "memberId")]
    member_id: Option<String>,
    #[serde(rename = "backupId")]
    backup_id: Option<String>,
}

pub async fn backup_restore(State(state): State<AppState>, Query(query): Query<RestoreQuery>) -> Response {
    let member_id = match audited(&state, AuditAction::BackupRestore, query.member_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let Some(backup_id) = query.backup_id else {
        return crate::api::error::bad_request("missing_backup_id", "backupId query param is required");
    };

    let src = state.config.workspace.root.join("backups").join(&backup_id);
    if !src.exists() {
        state.services.audit.record(
            AuditAction::BackupRestore,
            AuditOutcome::Fail,
            Some(member_id),
            None,
            None,
            Some("backup_not_found"),
        );
        return not_found("backup_not_found");
    }

    let result = (|| -> std::io::Result<()> {
        for entry in std::fs::read_dir(&src)? {
            let entry = entry?;
            let dest = state.config.workspace.root.join(entry.file_name());
            copy_dir_recursive(&entry.path(), &dest)?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            state.services.audit.record(
                AuditAction::BackupRestore,
                AuditOutcome::Allow,
                Some(member_id),
                None,
                None,
                Some(&backup_id),
            );
            Json(json!({ "ok": true, "backupId": backup_id })).into_response()
        }
        Err(e) => {
            state.services.audit.record(
                AuditAction::BackupRestore,
                AuditOutcome::Fail,
                Some(member_id),
                None,
                None,
                Some(&e.to_string()),
            );
            internal_error(&e.to_string())
        }
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_path = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

// ── Memory lanes ─────────────────────────────────────────────────────
//
// A lane is a named subdirectory of markdown files under each scope's
// memory directory: `memory/scopes/<hash(scopeId)>/<laneId>/*.md`. Export
// and delete act across every scope that has a directory for the lane;
// retention additionally consults `operations.lane_retention` from the
// control plane.

fn lane_dirs(state: &AppState, lane_id: &str) -> Vec<PathBuf> {
    let root = state.config.workspace.memory_scopes_dir();
    let Ok(entries) = std::fs::read_dir(&root) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path().join(lane_id))
        .filter(|p| p.is_dir())
        .collect()
}

pub async fn lane_export(
    State(state): State<AppState>,
    AxPath(lane_id): AxPath<String>,
    Query(query): Query<ManagerQuery>,
) -> Response {
    let member_id = match audited(&state, AuditAction::LaneExport, query.member_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let mut files = Vec::new();
    for dir in lane_dirs(&state, &lane_id) {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                files.push(json!({ "path": entry.path().display().to_string(), "content": content }));
            }
        }
    }

    state.services.audit.record(
        AuditAction::LaneExport,
        AuditOutcome::Allow,
        Some(member_id),
        None,
        Some(&lane_id),
        None,
    );
    Json(json!({ "ok": true, "laneId": lane_id, "files": files })).into_response()
}

pub async fn lane_delete(
    State(state): State<AppState>,
    AxPath(lane_id): AxPath<String>,
    Query(query): Query<ManagerQuery>,
) -> Response {
    let member_id = match audited(&state, AuditAction::LaneDelete, query.member_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let mut removed = 0usize;
    let mut errors = Vec::new();
    for dir in lane_dirs(&state, &lane_id) {
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => removed += 1,
            Err(e) => errors.push(format!("{}: {e}", dir.display())),
        }
    }

    let outcome = if errors.is_empty() { AuditOutcome::Allow } else { AuditOutcome::Fail };
    state.services.audit.record(
        AuditAction::LaneDelete,
        outcome,
        Some(member_id),
        None,
        Some(&lane_id),
        (!errors.is_empty()).then(|| errors.join("; ")).as_deref(),
    );
    Json(json!({ "ok": errors.is_empty(), "removedScopeDirs": removed, "errors": errors })).into_response()
}

pub async fn lane_retention(
    State(state): State<AppState>,
    AxPath(lane_id): AxPath<String>,
    Query(query): Query<ManagerQuery>,
) -> Response {
    let member_id = match audited(&state, AuditAction::LaneRetention, query.member_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let retention_days = state
        .family
        .control_plane
        .as_ref()
        .and_then(|cp| cp.operations.as_ref())
        .and_then(|ops| {
            ops.lane_retention
                .by_lane_id
                .get(&lane_id)
                .copied()
                .or(ops.lane_retention.default_days)
        });

    let Some(days) = retention_days else {
        state.services.audit.record(
            AuditAction::LaneRetention,
            AuditOutcome::Allow,
            Some(member_id),
            None,
            Some(&lane_id),
            Some("no retention policy configured, nothing deleted"),
        );
        return Json(json!({ "ok": true, "laneId": lane_id, "deletedFiles": 0 })).into_response();
    };

    let cutoff = std::time::SystemTime::now() - std::time::Duration::from_secs(days as u64 * 86_400);
    let mut deleted = 0usize;
    for dir in lane_dirs(&state, &lane_id) {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(modified) = meta.modified() else { continue };
            if modified < cutoff {
                if std::fs::remove_file(entry.path()).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    state.services.audit.record(
        AuditAction::LaneRetention,
        AuditOutcome::Allow,
        Some(member_id),
        None,
        Some(&lane_id),
        Some(&format!("{deleted} file(s) older than {days}d removed")),
    );
    Json(json!({ "ok": true, "laneId": lane_id, "deletedFiles": deleted })).into_response()
}
