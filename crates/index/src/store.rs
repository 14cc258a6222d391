use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sa_domain::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content_hash: String,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_idx: u64,
    pub chunk_id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub content_hash: String,
    pub token_count: usize,
    pub embedding: Vec<f32>,
    pub active: bool,
    pub superseded_by: Option<u64>,
    pub access_count: u64,
    pub last_accessed_at_ms: Option<i64>,
    pub created_at_ms: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexStoreData {
    files: HashMap<String, FileEntry>,
    chunks: Vec<Chunk>,
    embedding_cache: HashMap<String, Vec<f32>>,
    meta: HashMap<String, String>,
    next_chunk_idx: u64,
}

/// The per-scope logical vector store: a Files table, a Chunks table, an
/// embedding cache keyed by content hash, and a Meta key/value table (e.g.
/// `transcript_last_indexed_offset`). Persisted as one JSON file per scope;
/// a stable `chunkId` is unique within the store, inserts are idempotent,
/// and a superseded chunk never references itself.
pub struct IndexStore {
    path: PathBuf,
    data: Mutex<IndexStoreData>,
}

impl IndexStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            IndexStoreData::default()
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn save(&self, data: &IndexStoreData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn file(&self, path: &str) -> Option<FileEntry> {
        self.data.lock().unwrap().files.get(path).cloned()
    }

    pub fn upsert_file(&self, path: &str, content_hash: &str, now_ms: i64) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.files.insert(
            path.to_string(),
            FileEntry {
                path: path.to_string(),
                content_hash: content_hash.to_string(),
                updated_at_ms: now_ms,
            },
        );
        self.save(&data)
    }

    pub fn delete_file(&self, path: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.files.remove(path);
        self.save(&data)
    }

    pub fn tracked_paths(&self) -> Vec<String> {
        self.data.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn active_chunks_for_file(&self, path: &str) -> Vec<Chunk> {
        self.data
            .lock()
            .unwrap()
            .chunks
            .iter()
            .filter(|c| c.path == path && c.active)
            .cloned()
            .collect()
    }

    /// Idempotent insert: if a chunk with this `chunk_id` already exists,
    /// its index is returned unchanged rather than inserting a duplicate.
    pub fn insert_or_get(
        &self,
        chunk_id: &str,
        path: &str,
        start_line: usize,
        end_line: usize,
        content: &str,
        content_hash: &str,
        token_count: usize,
        embedding: Vec<f32>,
        now_ms: i64,
    ) -> Result<(u64, bool)> {
        let mut data = self.data.lock().unwrap();
        if let Some(existing) = data.chunks.iter().find(|c| c.chunk_id == chunk_id) {
            return Ok((existing.chunk_idx, false));
        }
        let idx = data.next_chunk_idx;
        data.next_chunk_idx += 1;
        data.chunks.push(Chunk {
            chunk_idx: idx,
            chunk_id: chunk_id.to_string(),
            path: path.to_string(),
            start_line,
            end_line,
            content: content.to_string(),
            content_hash: content_hash.to_string(),
            token_count,
            embedding,
            active: true,
            superseded_by: None,
            access_count: 0,
            last_accessed_at_ms: None,
            created_at_ms: now_ms,
        });
        self.save(&data)?;
        Ok((idx, true))
    }

    /// Marks `old_idx` inactive. `superseded_by` must not equal `old_idx`.
    pub fn supersede_chunk(&self, old_idx: u64, superseded_by: Option<u64>) -> Result<()> {
        if superseded_by == Some(old_idx) {
            return Err(sa_domain::Error::Other(
                "a chunk cannot supersede itself".into(),
            ));
        }
        let mut data = self.data.lock().unwrap();
        if let Some(chunk) = data.chunks.iter_mut().find(|c| c.chunk_idx == old_idx) {
            chunk.active = false;
            chunk.superseded_by = superseded_by;
        }
        self.save(&data)
    }

    pub fn embedding_cache_get(&self, content_hash: &str) -> Option<Vec<f32>> {
        self.data.lock().unwrap().embedding_cache.get(content_hash).cloned()
    }

    pub fn embedding_cache_put(&self, content_hash: &str, embedding: Vec<f32>) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.embedding_cache.insert(content_hash.to_string(), embedding);
        self.save(&data)
    }

    pub fn get_meta(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().meta.get(key).cloned()
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.meta.insert(key.to_string(), value.to_string());
        self.save(&data)
    }

    pub fn all_active_chunks(&self) -> Vec<Chunk> {
        self.data.lock().unwrap().chunks.iter().filter(|c| c.active).cloned().collect()
    }

    pub fn mark_accessed(&self, chunk_idx: u64, now_ms: i64) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        if let Some(chunk) = data.chunks.iter_mut().find(|c| c.chunk_idx == chunk_idx) {
            chunk.access_count += 1;
            chunk.last_accessed_at_ms = Some(now_ms);
        }
        self.save(&data)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_or_get_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        let (idx1, inserted1) = store
            .insert_or_get("c1", "notes.md", 0, 5, "hello", "hash1", 1, vec![1.0], 0)
            .unwrap();
        assert!(inserted1);
        let (idx2, inserted2) = store
            .insert_or_get("c1", "notes.md", 0, 5, "hello", "hash1", 1, vec![1.0], 0)
            .unwrap();
        assert!(!inserted2);
        assert_eq!(idx1, idx2);
    }

    #[test]
    fn supersede_rejects_self_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        let (idx, _) = store
            .insert_or_get("c1", "notes.md", 0, 5, "hello", "hash1", 1, vec![1.0], 0)
            .unwrap();
        assert!(store.supersede_chunk(idx, Some(idx)).is_err());
    }

    #[test]
    fn supersede_marks_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        let (idx, _) = store
            .insert_or_get("c1", "notes.md", 0, 5, "hello", "hash1", 1, vec![1.0], 0)
            .unwrap();
        store.supersede_chunk(idx, None).unwrap();
        assert!(store.active_chunks_for_file("notes.md").is_empty());
    }

    #[test]
    fn meta_round_trips_through_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = IndexStore::open(&path).unwrap();
            store.set_meta("transcript_last_indexed_offset", "4").unwrap();
        }
        let reopened = IndexStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_meta("transcript_last_indexed_offset"),
            Some("4".to_string())
        );
    }
}
