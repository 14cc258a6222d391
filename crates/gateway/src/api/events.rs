//! Tail endpoints for the event log and per-scope transcripts.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::api::error::internal_error;
use crate::collaborators::hash_scope_id;
use crate::state::AppState;

const DEFAULT_TAIL_LINES: usize = 50;

#[derive(serde::Deserialize)]
pub struct TailQuery {
    lines: Option<usize>,
}

pub async fn events_tail(State(state): State<AppState>, Query(query): Query<TailQuery>) -> Response {
    let n = query.lines.unwrap_or(DEFAULT_TAIL_LINES);
    let path = state.config.workspace.logs_dir().join("events.jsonl");
    match tail_file(&path, n) {
        Ok(lines) => Json(json!({ "lines": lines })).into_response(),
        Err(e) => internal_error(&e.to_string()),
    }
}

#[derive(serde::Deserialize)]
pub struct ScopedTailQuery {
    #[serde(rename = "scopeId")]
    scope_id: String,
    lines: Option<usize>,
}

pub async fn transcripts_tail(
    State(state): State<AppState>,
    Query(query): Query<ScopedTailQuery>,
) -> Response {
    let n = query.lines.unwrap_or(DEFAULT_TAIL_LINES);
    let transcript_id = hash_scope_id(&query.scope_id);
    let path = state
        .config
        .workspace
        .transcripts_dir()
        .join(format!("{transcript_id}.jsonl"));
    match tail_file(&path, n) {
        Ok(lines) => Json(json!({ "lines": lines })).into_response(),
        Err(e) => internal_error(&e.to_string()),
    }
}

fn tail_file(path: &std::path::Path, n: usize) -> std::io::Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    let all: Vec<&str> = contents.lines().collect();
    let start = all.len().saturating_sub(n);
    Ok(all[start..].iter().map(|s| s.to_string()).collect())
}
