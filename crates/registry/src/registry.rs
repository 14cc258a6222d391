use std::path::{Path, PathBuf};

use sa_domain::Result;
use tracing::warn;

use crate::lock::ScopeLockMap;
use crate::record::{FileRecord, ScopeRegistry};

/// Durable per-scope `(files, vectorStoreId)` storage, backed by one JSON
/// file per scope under `<root>/<scopeId>/registry.json`. All mutation is
/// mediated by [`ScopeLockMap`] so concurrent upload/indexing and retention
/// never interleave.
pub struct ScopeFileRegistryStore {
    root: PathBuf,
    locks: ScopeLockMap,
}

impl ScopeFileRegistryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: ScopeLockMap::new(),
        }
    }

    fn path_for(&self, scope_id: &str) -> PathBuf {
        self.root.join(scope_id).join("registry.json")
    }

    /// Reads the registry for a scope. Returns `None` when the scope has no
    /// registry file yet, or when the file on disk cannot be parsed —
    /// retention and lifecycle operations both treat an unreadable registry
    /// as "nothing to do" rather than a hard error.
    pub fn read(&self, scope_id: &str) -> Option<ScopeRegistry> {
        let path = self.path_for(scope_id);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<ScopeRegistry>(&raw) {
            Ok(registry) => Some(registry.normalize()),
            Err(err) => {
                warn!(scope_id, %err, "registry file is corrupt, treating as unreadable");
                None
            }
        }
    }

    fn write(&self, registry: &ScopeRegistry) -> Result<()> {
        let path = self.path_for(&registry.scope_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(registry)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub async fn upsert(&self, scope_id: &str, record: FileRecord, now_ms: i64) -> Result<()> {
        let _permit = self.locks.acquire(scope_id).await;
        let mut registry = self
            .read(scope_id)
            .unwrap_or_else(|| ScopeRegistry::new(scope_id, now_ms));
        registry.upsert(record, now_ms);
        self.write(&registry)
    }

    pub async fn replace(&self, scope_id: &str, records: Vec<FileRecord>, now_ms: i64) -> Result<()> {
        let _permit = self.locks.acquire(scope_id).await;
        let mut registry = self
            .read(scope_id)
            .unwrap_or_else(|| ScopeRegistry::new(scope_id, now_ms));
        registry.replace(records, now_ms);
        self.write(&registry)
    }

    pub async fn set_vector_store_id(&self, scope_id: &str, vector_store_id: Option<String>, now_ms: i64) -> Result<()> {
        let _permit = self.locks.acquire(scope_id).await;
        let mut registry = self
            .read(scope_id)
            .unwrap_or_else(|| ScopeRegistry::new(scope_id, now_ms));
        registry.vector_store_id = vector_store_id;
        registry.updated_at_ms = now_ms;
        self.write(&registry)
    }

    /// Lists scope ids with a registry file on disk, by listing immediate
    /// subdirectories of `root`. Used by the retention scheduler to enumerate
    /// candidate scopes without a separate index.
    pub fn list_scope_ids(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect()
    }

    pub async fn write_under_lock(&self, scope_id: &str, registry: &ScopeRegistry) -> Result<()> {
        let _permit = self.locks.acquire(scope_id).await;
        self.write(registry)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FileStatus};

    fn record(unique_id: &str) -> FileRecord {
        FileRecord {
            telegram_file_id: format!("tg-{unique_id}"),
            telegram_file_unique_id: unique_id.to_string(),
            filename: "photo.jpg".into(),
            mime_type: "image/jpeg".into(),
            size_bytes: 1,
            openai_file_id: None,
            vector_store_file_id: None,
            status: FileStatus::Completed,
            last_error: None,
            uploaded_by: "wags".into(),
            uploaded_at_ms: 1000,
            storage_metadata: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        store.upsert("scope-a", record("u1"), 100).await.unwrap();
        let registry = store.read("scope-a").unwrap();
        assert_eq!(registry.files.len(), 1);
        assert_eq!(registry.files[0].telegram_file_unique_id, "u1");
    }

    #[tokio::test]
    async fn read_missing_scope_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        assert!(store.read("nope").is_none());
    }

    #[tokio::test]
    async fn list_scope_ids_reflects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        store.upsert("scope-a", record("u1"), 100).await.unwrap();
        store.upsert("scope-b", record("u2"), 100).await.unwrap();
        let mut ids = store.list_scope_ids();
        ids.sort();
        assert_eq!(ids, vec!["scope-a".to_string(), "scope-b".to_string()]);
    }

    #[tokio::test]
    async fn set_vector_store_id_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        store
            .set_vector_store_id("scope-a", Some("vs-1".into()), 100)
            .await
            .unwrap();
        let registry = store.read("scope-a").unwrap();
        assert_eq!(registry.vector_store_id.as_deref(), Some("vs-1"));
    }
}
