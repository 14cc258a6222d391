pub mod lifecycle;
pub mod lock;
pub mod record;
pub mod registry;

pub use lifecycle::{DeleteOutcome, FileMemoryLifecycle, PurgeError, PurgeResult, RemoteFileDeleter};
pub use lock::ScopeLockMap;
pub use record::{FileRecord, FileStatus, ScopeRegistry, StorageMetadata};
pub use registry::ScopeFileRegistryStore;
