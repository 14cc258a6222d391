use serde::Serialize;

/// Structured trace events emitted across all halo crates.
///
/// Kept as typed, `.emit()`-able events (rather than ad-hoc `tracing::info!`
/// call sites sprinkled everywhere) so the shape of every significant
/// lifecycle moment is enforced by the compiler and greppable from one spot.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_key: String,
        session_id: String,
        is_new: bool,
    },
    SessionReset {
        session_key: String,
        old_session_id: String,
        new_session_id: String,
        reason: String,
    },
    TranscriptAppend {
        session_id: String,
        lines: usize,
    },
    IdentityResolved {
        raw_peer_id: String,
        canonical: String,
    },
    DecisionResolved {
        scope_id: String,
        action: String,
        rationale_len: usize,
    },
    RetentionRunStarted {
        trigger: &'static str,
    },
    RetentionRunFinished {
        scope_count: usize,
        candidate_count: usize,
        deleted_count: usize,
        failed_count: usize,
        dry_run: bool,
    },
    RemoteDeleteAttempted {
        scope_id: String,
        file_ref: String,
        ok: bool,
    },
    WatermarkAdvanced {
        scope_id: String,
        path: String,
        from_offset: u64,
        to_offset: u64,
    },
    ChunkSuperseded {
        scope_id: String,
        old_chunk_id: String,
        new_chunk_id: Option<String>,
        similarity: Option<f64>,
    },
    EmbeddingCacheMiss {
        content_hash: String,
        batch_size: usize,
    },
    RetryAttempt {
        operation: String,
        attempt: u32,
        max_retries: u32,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "halo_event");
    }
}
