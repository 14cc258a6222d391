use sa_domain::config::IndexConfig;
use sa_domain::Result;
use sa_sessions::transcript::TranscriptLine;

use crate::chunking::{content_hash, stable_chunk_id};
use crate::embedding::EmbeddingProvider;
use crate::retry::execute_with_retry;
use crate::search::LexicalIndex;
use crate::store::IndexStore;

fn watermark_key(session_id: &str) -> String {
    format!("transcript_watermark::{session_id}")
}

fn last_indexed_at_key(session_id: &str) -> String {
    format!("transcript_last_indexed_at_ms::{session_id}")
}

#[derive(Debug, Default)]
pub struct TranscriptSyncReport {
    pub lines_read: usize,
    pub chunks_inserted: usize,
}

/// Incrementally indexes new transcript lines for one session. The
/// watermark (lines already indexed) is read from the store's meta table,
/// bounded to at most `max_new_lines_per_sync` new lines per call, and only
/// advanced after every new line in the batch has been embedded and
/// inserted — a failure partway through leaves the watermark untouched, so
/// the next sync retries the same batch rather than skipping lines.
pub async fn sync_transcript(
    session_id: &str,
    lines: &[TranscriptLine],
    store: &IndexStore,
    embedder: &dyn EmbeddingProvider,
    lexical: &LexicalIndex,
    config: &IndexConfig,
    now_ms: i64,
) -> Result<TranscriptSyncReport> {
    let watermark: usize = store
        .get_meta(&watermark_key(session_id))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    if watermark >= lines.len() {
        return Ok(TranscriptSyncReport::default());
    }

    let remaining = &lines[watermark..];
    let batch_len = remaining.len().min(config.max_new_lines_per_sync);
    let batch = &remaining[..batch_len];

    let path = format!("transcript::{session_id}");
    let mut to_embed = Vec::new();
    for line in batch {
        to_embed.push(format!("{}: {}", line.role, line.content));
    }

    let embeddings = execute_with_retry(
        "embed_transcript",
        config.max_retries,
        config.base_delay_ms,
        || embedder.embed(&to_embed),
    )
    .await
    .map_err(|e| sa_domain::Error::Remote(e.to_string()))?;

    let mut inserted = 0usize;
    for (offset, (text, embedding)) in to_embed.iter().zip(embeddings.into_iter()).enumerate() {
        let line_idx = watermark + offset;
        let id = stable_chunk_id(&path, line_idx, line_idx);
        let hash = content_hash(text);
        let (idx, is_new) = store.insert_or_get(
            &id,
            &path,
            line_idx,
            line_idx,
            text,
            &hash,
            text.split_whitespace().count(),
            embedding,
            now_ms,
        )?;
        if is_new {
            inserted += 1;
            lexical.index_chunk(idx, text);
        }
    }

    store.set_meta(&watermark_key(session_id), &(watermark + batch_len).to_string())?;
    store.set_meta(&last_indexed_at_key(session_id), &now_ms.to_string())?;

    Ok(TranscriptSyncReport {
        lines_read: batch_len,
        chunks_inserted: inserted,
    })
}
