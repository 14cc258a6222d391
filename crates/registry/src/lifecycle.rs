use sa_domain::Result;

use crate::record::FileRecord;
use crate::registry::ScopeFileRegistryStore;

/// Boundary to the remote vector-store-file and OpenAI-file deletion APIs.
/// Implemented outside this crate; exercised here only through this trait.
#[async_trait::async_trait]
pub trait RemoteFileDeleter: Send + Sync {
    async fn delete_vector_store_file(&self, vector_store_id: &str, vector_store_file_id: &str) -> std::result::Result<(), String>;
    async fn delete_openai_file(&self, openai_file_id: &str) -> std::result::Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    ScopeNotFound,
    FileNotFound,
    RemoteDeleteFailed { message: String },
}

#[derive(Debug, Clone)]
pub struct PurgeResult {
    pub ok: bool,
    pub removed_count: usize,
    pub remaining_count: usize,
    pub errors: Vec<PurgeError>,
}

#[derive(Debug, Clone)]
pub struct PurgeError {
    pub file_ref: String,
    pub message: String,
}

pub struct FileMemoryLifecycle<'a> {
    store: &'a ScopeFileRegistryStore,
    deleter: &'a dyn RemoteFileDeleter,
}

impl<'a> FileMemoryLifecycle<'a> {
    pub fn new(store: &'a ScopeFileRegistryStore, deleter: &'a dyn RemoteFileDeleter) -> Self {
        Self { store, deleter }
    }

    /// Deletes a single file, coordinating remote vector-store-file deletion,
    /// optional remote OpenAI-file deletion, and registry mutation. Resolves
    /// `file_ref` against any of the file's four id fields. Remote calls run
    /// before any local mutation; on remote failure the registry is left
    /// untouched.
    pub async fn delete(
        &self,
        scope_id: &str,
        file_ref: &str,
        delete_openai_file: bool,
        now_ms: i64,
    ) -> Result<DeleteOutcome> {
        let Some(mut registry) = self.store.read(scope_id) else {
            return Ok(DeleteOutcome::ScopeNotFound);
        };
        let Some(record) = registry.find_by_ref(file_ref).cloned() else {
            return Ok(DeleteOutcome::FileNotFound);
        };

        if let Some(vs_file_id) = &record.vector_store_file_id {
            let vector_store_id = registry.vector_store_id.clone().unwrap_or_default();
            if let Err(message) = self
                .deleter
                .delete_vector_store_file(&vector_store_id, vs_file_id)
                .await
            {
                return Ok(DeleteOutcome::RemoteDeleteFailed { message });
            }
        }
        if delete_openai_file {
            if let Some(openai_id) = &record.openai_file_id {
                if let Err(message) = self.deleter.delete_openai_file(openai_id).await {
                    return Ok(DeleteOutcome::RemoteDeleteFailed { message });
                }
            }
        }

        registry.files.retain(|f| f.telegram_file_unique_id != record.telegram_file_unique_id);
        registry.updated_at_ms = now_ms;
        self.store.write_under_lock(scope_id, &registry).await?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Iterates every file in the scope; per-file errors are collected and
    /// the file is kept, successfully-deleted files are removed.
    pub async fn purge(&self, scope_id: &str, delete_openai_files: bool, now_ms: i64) -> Result<PurgeResult> {
        let Some(registry) = self.store.read(scope_id) else {
            return Ok(PurgeResult {
                ok: true,
                removed_count: 0,
                remaining_count: 0,
                errors: Vec::new(),
            });
        };

        let refs: Vec<String> = registry
            .files
            .iter()
            .map(|f| f.telegram_file_unique_id.clone())
            .collect();

        let mut removed = 0usize;
        let mut errors = Vec::new();
        for file_ref in refs {
            match self.delete(scope_id, &file_ref, delete_openai_files, now_ms).await? {
                DeleteOutcome::Deleted => removed += 1,
                DeleteOutcome::ScopeNotFound | DeleteOutcome::FileNotFound => {}
                DeleteOutcome::RemoteDeleteFailed { message } => {
                    errors.push(PurgeError { file_ref, message })
                }
            }
        }

        let remaining = self
            .store
            .read(scope_id)
            .map(|r| r.files.len())
            .unwrap_or(0);

        Ok(PurgeResult {
            ok: errors.is_empty(),
            removed_count: removed,
            remaining_count: remaining,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FileStatus, ScopeRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDeleter {
        fail_vector_store: bool,
        deletes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RemoteFileDeleter for FakeDeleter {
        async fn delete_vector_store_file(&self, _vs_id: &str, _file_id: &str) -> std::result::Result<(), String> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_vector_store {
                Err("vector store unavailable".into())
            } else {
                Ok(())
            }
        }
        async fn delete_openai_file(&self, _file_id: &str) -> std::result::Result<(), String> {
            Ok(())
        }
    }

    fn record(unique_id: &str, vs_file_id: Option<&str>) -> FileRecord {
        FileRecord {
            telegram_file_id: format!("tg-{unique_id}"),
            telegram_file_unique_id: unique_id.to_string(),
            filename: "f.jpg".into(),
            mime_type: "image/jpeg".into(),
            size_bytes: 1,
            openai_file_id: None,
            vector_store_file_id: vs_file_id.map(|s| s.to_string()),
            status: FileStatus::Completed,
            last_error: None,
            uploaded_by: "wags".into(),
            uploaded_at_ms: 1,
            storage_metadata: None,
        }
    }

    #[tokio::test]
    async fn delete_missing_scope_is_scope_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        let deleter = FakeDeleter { fail_vector_store: false, deletes: AtomicUsize::new(0) };
        let lifecycle = FileMemoryLifecycle::new(&store, &deleter);
        let outcome = lifecycle.delete("scope-a", "u1", false, 10).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::ScopeNotFound);
    }

    #[tokio::test]
    async fn delete_missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        store.upsert("scope-a", record("u1", None), 1).await.unwrap();
        let deleter = FakeDeleter { fail_vector_store: false, deletes: AtomicUsize::new(0) };
        let lifecycle = FileMemoryLifecycle::new(&store, &deleter);
        let outcome = lifecycle.delete("scope-a", "missing", false, 10).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::FileNotFound);
    }

    #[tokio::test]
    async fn remote_failure_leaves_registry_unmutated() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        store.upsert("scope-a", record("u1", Some("vs-file-1")), 1).await.unwrap();
        let deleter = FakeDeleter { fail_vector_store: true, deletes: AtomicUsize::new(0) };
        let lifecycle = FileMemoryLifecycle::new(&store, &deleter);
        let outcome = lifecycle.delete("scope-a", "u1", false, 10).await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::RemoteDeleteFailed { .. }));
        let registry = store.read("scope-a").unwrap();
        assert_eq!(registry.files.len(), 1);
    }

    #[tokio::test]
    async fn successful_delete_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        store.upsert("scope-a", record("u1", Some("vs-file-1")), 1).await.unwrap();
        let deleter = FakeDeleter { fail_vector_store: false, deletes: AtomicUsize::new(0) };
        let lifecycle = FileMemoryLifecycle::new(&store, &deleter);
        let outcome = lifecycle.delete("scope-a", "u1", false, 10).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        let registry = store.read("scope-a").unwrap();
        assert!(registry.files.is_empty());
    }

    #[tokio::test]
    async fn purge_collects_errors_and_keeps_failed_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScopeFileRegistryStore::new(dir.path());
        let mut registry = ScopeRegistry::new("scope-a", 1);
        registry.upsert(record("u1", Some("vs-1")), 1);
        registry.upsert(record("u2", None), 1);
        store.write_under_lock("scope-a", &registry).await.unwrap();

        let deleter = FakeDeleter { fail_vector_store: true, deletes: AtomicUsize::new(0) };
        let lifecycle = FileMemoryLifecycle::new(&store, &deleter);
        let result = lifecycle.purge("scope-a", false, 10).await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.removed_count, 1);
        assert_eq!(result.remaining_count, 1);
        assert_eq!(result.errors.len(), 1);
    }
}
