//! Semantic search endpoint: hybrid vector + lexical rank fusion over the
//! indexed chunk store.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sa_index::{search, SearchRequest};

use crate::api::error::bad_request;
use crate::api::query::parse_timestamp_ms;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    #[serde(rename = "topK")]
    top_k: Option<usize>,
    now: Option<String>,
}

/// `GET /search?q=<query>&topK=<n>`. Loopback-gated, like the rest of the
/// admin surface — this is an operator/debugging window into the index, not
/// a per-member retrieval API, so the policy gate admits every active
/// chunk rather than re-deriving per-scope visibility here.
pub async fn search_chunks(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Response {
    let Some(q) = query.q.filter(|s| !s.trim().is_empty()) else {
        return bad_request("missing_query", "?q=<query> is required");
    };

    let now_ms = match parse_timestamp_ms(query.now.as_deref()) {
        Some(Ok(n)) => n,
        Some(Err(message)) => return bad_request("invalid_timestamp", &message),
        None => chrono::Utc::now().timestamp_millis(),
    };
    let top_k = query.top_k.unwrap_or(10).clamp(1, 100);

    let query_embedding = match state.services.embedder.embed(&[q.clone()]).await {
        Ok(mut embeddings) => embeddings.pop(),
        Err(e) => {
            tracing::warn!(error = %e, "query embedding failed, falling back to lexical-only search");
            None
        }
    };

    let request = SearchRequest {
        query: &q,
        query_embedding: query_embedding.as_deref(),
        top_k,
        now_ms,
    };

    let hits = search(
        &state.services.index,
        &state.services.lexical,
        &request,
        &state.config.search,
        &|_chunk| true,
    );

    Json(json!({
        "hits": hits.iter().map(|h| json!({
            "chunkIdx": h.chunk_idx,
            "path": h.path,
            "content": h.content,
            "score": h.score,
        })).collect::<Vec<_>>(),
    }))
    .into_response()
}
