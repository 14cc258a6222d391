use std::collections::HashSet;
use std::path::Path;

use sa_domain::config::IndexConfig;
use sa_domain::Result;

use crate::chunking::{chunk_lines, cosine_similarity, content_hash, stable_chunk_id};
use crate::embedding::EmbeddingProvider;
use crate::retry::execute_with_retry;
use crate::search::LexicalIndex;
use crate::store::IndexStore;

#[derive(Debug, Default)]
pub struct MarkdownSyncReport {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub chunks_inserted: usize,
    pub chunks_superseded: usize,
    pub errors: Vec<String>,
}

/// Scans every `.md` file directly under `scope_dir`, re-chunking and
/// re-embedding only the files whose content hash changed since the last
/// sync. A file's chunk set is reconciled against its previous chunk set by
/// stable chunk id: chunks whose boundaries are unchanged are left active,
/// unmatched old chunks are superseded by their nearest-cosine-similarity
/// replacement (or by nothing, if none clears the similarity threshold).
///
/// A failure embedding one file does not roll back files already
/// reconciled in the same pass; it is recorded in the report and the sync
/// continues with the next file.
pub async fn sync_markdown_scope(
    scope_dir: &Path,
    store: &IndexStore,
    embedder: &dyn EmbeddingProvider,
    lexical: &LexicalIndex,
    config: &IndexConfig,
    now_ms: i64,
) -> Result<MarkdownSyncReport> {
    let mut report = MarkdownSyncReport::default();

    let entries = match std::fs::read_dir(scope_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(err) => return Err(err.into()),
    };

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    paths.sort();

    let current_names: HashSet<String> = paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();

    for tracked in store.tracked_paths() {
        if current_names.contains(&tracked) {
            continue;
        }
        for chunk in store.active_chunks_for_file(&tracked) {
            store.supersede_chunk(chunk.chunk_idx, None)?;
            lexical.remove_chunk(chunk.chunk_idx);
            report.chunks_superseded += 1;
        }
        store.delete_file(&tracked)?;
        report.files_changed += 1;
    }

    for path in paths {
        report.files_scanned += 1;
        let rel = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(err) => {
                report.errors.push(format!("{rel}: {err}"));
                continue;
            }
        };
        let hash = content_hash(&content);

        if let Some(existing) = store.file(&rel) {
            if existing.content_hash == hash {
                continue;
            }
        }
        report.files_changed += 1;

        match reconcile_file(&rel, &content, store, embedder, lexical, config, now_ms).await {
            Ok((inserted, superseded)) => {
                report.chunks_inserted += inserted;
                report.chunks_superseded += superseded;
                store.upsert_file(&rel, &hash, now_ms)?;
            }
            Err(err) => {
                report.errors.push(format!("{rel}: {err}"));
            }
        }
    }

    Ok(report)
}

async fn reconcile_file(
    rel_path: &str,
    content: &str,
    store: &IndexStore,
    embedder: &dyn EmbeddingProvider,
    lexical: &LexicalIndex,
    config: &IndexConfig,
    now_ms: i64,
) -> Result<(usize, usize)> {
    let drafts = chunk_lines(content, config.chunk_target_tokens);
    let previous = store.active_chunks_for_file(rel_path);

    let mut to_embed = Vec::new();
    let mut draft_ids = Vec::new();
    for draft in &drafts {
        let id = stable_chunk_id(rel_path, draft.start_line, draft.end_line);
        if store.embedding_cache_get(&draft.content_hash).is_none() {
            to_embed.push(draft.content.clone());
        }
        draft_ids.push(id);
    }

    let embeddings = if to_embed.is_empty() {
        Vec::new()
    } else {
        execute_with_retry("embed_markdown", config.max_retries, config.base_delay_ms, || {
            embedder.embed(&to_embed)
        })
        .await
        .map_err(|e| sa_domain::Error::Remote(e.to_string()))?
    };
    let mut embed_iter = embeddings.into_iter();

    let mut inserted = 0usize;
    let mut new_chunk_idxs = Vec::new();
    for (draft, id) in drafts.iter().zip(draft_ids.iter()) {
        let embedding = match store.embedding_cache_get(&draft.content_hash) {
            Some(cached) => cached,
            None => {
                let fresh = embed_iter.next().unwrap_or_default();
                store.embedding_cache_put(&draft.content_hash, fresh.clone())?;
                fresh
            }
        };
        let (idx, is_new) = store.insert_or_get(
            id,
            rel_path,
            draft.start_line,
            draft.end_line,
            &draft.content,
            &draft.content_hash,
            draft.token_count,
            embedding.clone(),
            now_ms,
        )?;
        if is_new {
            inserted += 1;
            lexical.index_chunk(idx, &draft.content);
        }
        new_chunk_idxs.push((idx, embedding));
    }

    let current_ids: Vec<&String> = draft_ids.iter().collect();
    let mut superseded = 0usize;
    for old in previous {
        let old_id = stable_chunk_id(rel_path, old.start_line, old.end_line);
        if current_ids.iter().any(|id| **id == old_id) {
            continue;
        }
        let replacement = new_chunk_idxs
            .iter()
            .map(|(idx, emb)| (*idx, cosine_similarity(&old.embedding, emb)))
            .filter(|(_, sim)| *sim >= config.similarity_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        store.supersede_chunk(old.chunk_idx, replacement.map(|(idx, _)| idx))?;
        lexical.remove_chunk(old.chunk_idx);
        superseded += 1;
    }

    Ok((inserted, superseded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::retry::RemoteError;

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn second_sync_with_unchanged_content_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "hello\nworld\n").unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        let config = IndexConfig::default();
        let embedder = StubEmbedder;
        let lexical = LexicalIndex::new();

        let r1 = sync_markdown_scope(dir.path(), &store, &embedder, &lexical, &config, 0)
            .await
            .unwrap();
        assert_eq!(r1.files_changed, 1);
        assert!(r1.chunks_inserted > 0);

        let r2 = sync_markdown_scope(dir.path(), &store, &embedder, &lexical, &config, 1000)
            .await
            .unwrap();
        assert_eq!(r2.files_changed, 0);
        assert_eq!(r2.chunks_inserted, 0);
    }

    #[tokio::test]
    async fn editing_a_file_supersedes_its_old_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "line one\nline two\n").unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        let config = IndexConfig::default();
        let embedder = StubEmbedder;
        let lexical = LexicalIndex::new();

        sync_markdown_scope(dir.path(), &store, &embedder, &lexical, &config, 0)
            .await
            .unwrap();
        let before = store.active_chunks_for_file("notes.md").len();
        assert!(before > 0);

        std::fs::write(&path, "a totally different document\nwith new lines\n").unwrap();
        let r2 = sync_markdown_scope(dir.path(), &store, &embedder, &lexical, &config, 1000)
            .await
            .unwrap();
        assert_eq!(r2.files_changed, 1);
        assert!(r2.chunks_superseded > 0);
    }

    #[tokio::test]
    async fn removing_a_tracked_file_supersedes_its_chunks_and_drops_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "line one\nline two\n").unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        let config = IndexConfig::default();
        let embedder = StubEmbedder;
        let lexical = LexicalIndex::new();

        sync_markdown_scope(dir.path(), &store, &embedder, &lexical, &config, 0)
            .await
            .unwrap();
        assert!(store.file("notes.md").is_some());
        assert!(!store.active_chunks_for_file("notes.md").is_empty());

        std::fs::remove_file(&path).unwrap();
        let r2 = sync_markdown_scope(dir.path(), &store, &embedder, &lexical, &config, 1000)
            .await
            .unwrap();

        assert_eq!(r2.files_scanned, 0);
        assert!(r2.chunks_superseded > 0);
        assert!(store.file("notes.md").is_none());
        assert!(store.active_chunks_for_file("notes.md").is_empty());
    }
}
