use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageMetadata {
    pub lane_id: String,
    pub scope_id: String,
    pub owner_member_id: String,
    pub policy_version: String,
    pub artifact_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub telegram_file_id: String,
    pub telegram_file_unique_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub openai_file_id: Option<String>,
    pub vector_store_file_id: Option<String>,
    pub status: FileStatus,
    pub last_error: Option<String>,
    pub uploaded_by: String,
    pub uploaded_at_ms: i64,
    pub storage_metadata: Option<StorageMetadata>,
}

impl FileRecord {
    /// Resolves a caller-supplied reference against any of the four id
    /// fields a file can be addressed by.
    pub fn matches_ref(&self, file_ref: &str) -> bool {
        self.telegram_file_unique_id == file_ref
            || self.telegram_file_id == file_ref
            || self.openai_file_id.as_deref() == Some(file_ref)
            || self.vector_store_file_id.as_deref() == Some(file_ref)
    }
}

/// One per scope, on disk at `file-memory/scopes/<scopeId>/registry.json`.
/// `scopeId` directories are not hashed, unlike sessions/transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeRegistry {
    pub scope_id: String,
    pub vector_store_id: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub files: Vec<FileRecord>,
}

impl ScopeRegistry {
    pub fn new(scope_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            scope_id: scope_id.into(),
            vector_store_id: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            files: Vec::new(),
        }
    }

    /// Drops records that fail to deserialize cleanly; tolerated so a single
    /// corrupt entry does not make the whole registry unreadable.
    pub fn normalize(mut self) -> Self {
        self.files.retain(|f| !f.telegram_file_unique_id.is_empty());
        self
    }

    pub fn upsert(&mut self, record: FileRecord, now_ms: i64) {
        if let Some(existing) = self
            .files
            .iter_mut()
            .find(|f| f.telegram_file_unique_id == record.telegram_file_unique_id)
        {
            *existing = record;
        } else {
            self.files.push(record);
        }
        self.updated_at_ms = now_ms;
    }

    pub fn replace(&mut self, records: Vec<FileRecord>, now_ms: i64) {
        self.files = records;
        self.updated_at_ms = now_ms;
    }

    pub fn find_by_ref(&self, file_ref: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.matches_ref(file_ref))
    }
}
