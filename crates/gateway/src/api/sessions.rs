//! Session lifecycle endpoints: list, clear, purge, distill, semantic-sync,
//! and parent/child-gated transcript retrieval.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use subtle::ConstantTimeEq;

use sa_domain::config::AgeGroup;
use sa_index::sync_transcript;
use sa_registry::FileMemoryLifecycle;

use crate::api::error::{bad_request, conflict, not_found};
use crate::collaborators::hash_scope_id;
use crate::state::AppState;

pub async fn list_sessions(State(state): State<AppState>) -> Response {
    let sessions = state.services.sessions.list();
    Json(json!({ "sessions": sessions })).into_response()
}

pub async fn list_sessions_with_counts(State(state): State<AppState>) -> Response {
    let sessions = state.services.sessions.list();
    let mut out = Vec::with_capacity(sessions.len());
    for entry in sessions {
        let transcript_id = hash_scope_id(&entry.session_key);
        let line_count = state
            .services
            .transcripts
            .read(&transcript_id)
            .map(|lines| lines.len())
            .unwrap_or(0);
        out.push(json!({
            "sessionKey": entry.session_key,
            "sessionId": entry.session_id,
            "model": entry.model,
            "totalTokens": entry.total_tokens,
            "updatedAt": entry.updated_at,
            "transcriptLineCount": line_count,
        }));
    }
    Json(json!({ "sessions": out })).into_response()
}

pub async fn clear_session(
    State(state): State<AppState>,
    Path(scope_id): Path<String>,
) -> Response {
    match state.services.sessions.reset_session(&scope_id, "admin_clear") {
        Some(entry) => Json(json!({ "ok": true, "sessionId": entry.session_id })).into_response(),
        None => not_found("scope_not_found"),
    }
}

#[derive(serde::Deserialize)]
pub struct PurgeQuery {
    confirm: Option<String>,
}

pub async fn purge_session(
    State(state): State<AppState>,
    Path(scope_id): Path<String>,
    Query(query): Query<PurgeQuery>,
) -> Response {
    let Some(confirm) = query.confirm else {
        return bad_request("confirm_required", "?confirm=<scopeId> is required");
    };

    // Constant-time compare: the confirm token stands in for a
    // secret-equivalent value even though it is just the scope id.
    let matches: bool = confirm.as_bytes().ct_eq(scope_id.as_bytes()).into();
    if !matches {
        return bad_request("confirm_required", "confirm does not match scope id");
    }

    state.services.sessions.reset_session(&scope_id, "admin_purge");

    let lifecycle =
        FileMemoryLifecycle::new(state.services.registry.as_ref(), state.services.deleter.as_ref());
    let purge_result = lifecycle
        .purge(&scope_id, state.config.retention.delete_openai_files, now_ms())
        .await;

    match purge_result {
        Ok(result) => Json(json!({
            "ok": true,
            "removedCount": result.removed_count,
            "remainingCount": result.remaining_count,
            "errors": result.errors.iter().map(|e| json!({
                "fileRef": e.file_ref,
                "message": e.message,
            })).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => crate::api::error::internal_error(&e.to_string()),
    }
}

pub async fn distill_session(State(_state): State<AppState>, Path(_scope_id): Path<String>) -> Response {
    conflict("distillation_disabled")
}

pub async fn semantic_sync_session(
    State(state): State<AppState>,
    Path(scope_id): Path<String>,
) -> Response {
    let transcript_id = hash_scope_id(&scope_id);
    let lines = state
        .services
        .transcripts
        .read(&transcript_id)
        .unwrap_or_default();

    let transcript_report = sync_transcript(
        &transcript_id,
        &lines,
        &state.services.index,
        state.services.embedder.as_ref(),
        &state.services.lexical,
        &state.config.index,
        now_ms(),
    )
    .await;

    let scope_hash = hash_scope_id(&scope_id);
    let scope_dir = state.config.workspace.memory_scopes_dir().join(&scope_hash);
    let markdown_report = sa_index::sync_markdown_scope(
        &scope_dir,
        &state.services.index,
        state.services.embedder.as_ref(),
        &state.services.lexical,
        &state.config.index,
        now_ms(),
    )
    .await;

    match (transcript_report, markdown_report) {
        (Ok(t), Ok(m)) => Json(json!({
            "ok": true,
            "transcript": { "linesRead": t.lines_read, "chunksInserted": t.chunks_inserted },
            "markdown": {
                "filesScanned": m.files_scanned,
                "filesChanged": m.files_changed,
                "chunksInserted": m.chunks_inserted,
                "chunksSuperseded": m.chunks_superseded,
                "errors": m.errors,
            },
        }))
        .into_response(),
        (Err(e), _) | (_, Err(e)) => crate::api::error::internal_error(&e.to_string()),
    }
}

#[derive(serde::Deserialize)]
pub struct TranscriptQuery {
    role: Option<String>,
    #[serde(rename = "memberId")]
    member_id: Option<String>,
}

pub async fn get_transcript(
    State(state): State<AppState>,
    Path(scope_id): Path<String>,
    Query(query): Query<TranscriptQuery>,
) -> Response {
    if query.role.as_deref() != Some("parent") {
        return crate::api::error::forbidden("forbidden");
    }

    let Some(member_id) = query.member_id else {
        return bad_request("missing_member_id", "memberId query param is required");
    };

    let Some(member) = state.family.member(&member_id) else {
        return not_found("unknown_member");
    };

    if member.role != sa_domain::config::Role::Child {
        return crate::api::error::forbidden("forbidden");
    }

    let needs_visibility = matches!(member.age_group, Some(AgeGroup::Teen) | Some(AgeGroup::YoungAdult));
    if needs_visibility && member.parental_visibility != Some(true) {
        return crate::api::error::forbidden("parental_visibility_required");
    }

    let transcript_id = hash_scope_id(&scope_id);
    match state.services.transcripts.read(&transcript_id) {
        Ok(lines) => Json(json!({ "lines": lines })).into_response(),
        Err(e) => crate::api::error::internal_error(&e.to_string()),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
