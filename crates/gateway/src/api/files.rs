//! Per-scope file registry inspection and deletion.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sa_registry::FileMemoryLifecycle;

use crate::api::error::{internal_error, not_found};
use crate::state::AppState;

pub async fn list_files(State(state): State<AppState>, Path(scope_id): Path<String>) -> Response {
    match state.services.registry.read(&scope_id) {
        Some(registry) => Json(json!({
            "scopeId": registry.scope_id,
            "vectorStoreId": registry.vector_store_id,
            "files": registry.files,
        }))
        .into_response(),
        None => not_found("scope_not_found"),
    }
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path((scope_id, file_ref)): Path<(String, String)>,
) -> Response {
    let lifecycle =
        FileMemoryLifecycle::new(state.services.registry.as_ref(), state.services.deleter.as_ref());
    let now_ms = chrono::Utc::now().timestamp_millis();
    match lifecycle
        .delete(
            &scope_id,
            &file_ref,
            state.config.retention.delete_openai_files,
            now_ms,
        )
        .await
    {
        Ok(outcome) => Json(json!({ "ok": true, "outcome": format!("{outcome:?}") })).into_response(),
        Err(e) => internal_error(&e.to_string()),
    }
}
