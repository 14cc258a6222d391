pub mod auth;
pub mod error;
pub mod events;
pub mod files;
pub mod health;
pub mod operations;
pub mod query;
pub mod retention;
pub mod search;
pub mod sessions;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full admin router: an always-open group, and a
/// loopback-gated group covering everything else. `/operations/*` and
/// `/memory/lanes/*` additionally self-check operational-manager
/// membership inside their handlers (see `api::auth::require_operational_manager`),
/// since that check depends on a per-request `memberId`, not just the
/// remote address.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/status", get(health::status))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions-with-counts", get(sessions::list_sessions_with_counts))
        .route("/policy/status", get(health::policy_status));

    let loopback_only = Router::new()
        .route("/events/tail", get(events::events_tail))
        .route("/transcripts/tail", get(events::transcripts_tail))
        .route("/sessions/:scopeId/clear", post(sessions::clear_session))
        .route("/sessions/:scopeId/purge", post(sessions::purge_session))
        .route("/sessions/:scopeId/distill", post(sessions::distill_session))
        .route(
            "/sessions/:scopeId/semantic-sync",
            post(sessions::semantic_sync_session),
        )
        .route("/sessions/:scopeId/transcript", get(sessions::get_transcript))
        .route("/file-retention/run", post(retention::run_retention))
        .route("/search", get(search::search_chunks))
        .route("/sessions/:scopeId/files", get(files::list_files))
        .route("/sessions/:scopeId/files/:fileRef", delete(files::delete_file))
        .route("/operations/backup/create", post(operations::backup_create))
        .route("/operations/backup/restore", post(operations::backup_restore))
        .route("/memory/lanes/:laneId/export", get(operations::lane_export))
        .route("/memory/lanes/:laneId", delete(operations::lane_delete))
        .route(
            "/memory/lanes/:laneId/retention",
            post(operations::lane_retention),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_loopback));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(loopback_only)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
