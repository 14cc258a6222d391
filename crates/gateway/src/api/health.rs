//! Always-open status endpoints.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

pub async fn status(State(state): State<AppState>) -> Response {
    let retention_status = match &state.services.retention {
        Some(scheduler) => Some(scheduler.status().await),
        None => None,
    };
    Json(json!({
        "familyId": state.family.family_id,
        "sessionCount": state.services.sessions.list().len(),
        "scopeCount": state.services.registry.list_scope_ids().len(),
        "retention": retention_status,
    }))
    .into_response()
}

pub async fn policy_status(State(state): State<AppState>) -> Response {
    match &state.family.control_plane {
        Some(cp) => Json(json!({
            "policyVersion": cp.policy_version,
            "activeProfileId": cp.active_profile_id,
        }))
        .into_response(),
        None => Json(json!({
            "policyVersion": null,
            "activeProfileId": null,
        }))
        .into_response(),
    }
}
