//! Manual retention run trigger.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sa_retention::RunOptions;

use crate::api::error::{conflict, service_unavailable};
use crate::api::query::{parse_bool, parse_csv, parse_timestamp_ms};
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct RunQuery {
    #[serde(rename = "scopeId")]
    scope_id: Option<String>,
    #[serde(rename = "dryRun")]
    dry_run: Option<String>,
    #[serde(rename = "uploadedBy")]
    uploaded_by: Option<String>,
    extensions: Option<String>,
    #[serde(rename = "mimePrefixes")]
    mime_prefixes: Option<String>,
    #[serde(rename = "uploadedAfterMs")]
    uploaded_after_ms: Option<String>,
    #[serde(rename = "uploadedBeforeMs")]
    uploaded_before_ms: Option<String>,
}

pub async fn run_retention(State(state): State<AppState>, Query(query): Query<RunQuery>) -> Response {
    if !state.config.retention.enabled {
        return conflict("file_retention_disabled");
    }

    let Some(scheduler) = &state.services.retention else {
        return service_unavailable("no_scheduler_attached");
    };

    let uploaded_after_ms = match parse_timestamp_ms(query.uploaded_after_ms.as_deref()) {
        Some(Err(msg)) => return crate::api::error::bad_request("invalid_timestamp", &msg),
        Some(Ok(v)) => Some(v),
        None => None,
    };
    let uploaded_before_ms = match parse_timestamp_ms(query.uploaded_before_ms.as_deref()) {
        Some(Err(msg)) => return crate::api::error::bad_request("invalid_timestamp", &msg),
        Some(Ok(v)) => Some(v),
        None => None,
    };

    let options = RunOptions {
        scope_id: query.scope_id.clone(),
        dry_run: query.dry_run.as_deref().map(|v| parse_bool(Some(v), false)),
        uploaded_by: query
            .uploaded_by
            .is_some()
            .then(|| parse_csv(query.uploaded_by.as_deref()).into_iter().collect()),
        extensions: query
            .extensions
            .is_some()
            .then(|| parse_csv(query.extensions.as_deref()).into_iter().collect()),
        mime_prefixes: query
            .mime_prefixes
            .is_some()
            .then(|| parse_csv(query.mime_prefixes.as_deref())),
        uploaded_after_ms,
        uploaded_before_ms,
    }
    .normalized();

    let summary = scheduler.run_now(options).await;
    let status = scheduler.status().await;
    Json(json!({ "ok": true, "requested": true, "status": status, "summary": summary })).into_response()
}
