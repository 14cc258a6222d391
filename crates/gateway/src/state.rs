//! Shared application state threaded through every admin handler.

use std::sync::Arc;

use sa_domain::config::{Config, FamilyConfig};
use sa_index::{IndexStore, LexicalIndex};
use sa_registry::{RemoteFileDeleter, ScopeFileRegistryStore};
use sa_retention::RetentionScheduler;
use sa_sessions::{IdentityResolver, LifecycleManager, SessionStore, TranscriptWriter};

use crate::audit::AuditLog;

/// The collaborators every admin handler may need, grouped separately from
/// the config snapshot so cloning `AppState` for a request never clones the
/// config document itself.
pub struct Services {
    pub sessions: Arc<SessionStore>,
    pub identity: Arc<IdentityResolver>,
    pub lifecycle: Arc<LifecycleManager>,
    pub transcripts: Arc<TranscriptWriter>,
    pub registry: Arc<ScopeFileRegistryStore>,
    pub deleter: Arc<dyn RemoteFileDeleter>,
    /// `None` models "the runtime has no scheduler attached" — a distinct
    /// condition from `config.retention.enabled == false` — per the admin
    /// handler surface's 503-vs-409 distinction on `/file-retention/run`.
    pub retention: Option<Arc<RetentionScheduler>>,
    pub index: Arc<IndexStore>,
    pub lexical: Arc<LexicalIndex>,
    pub embedder: Arc<dyn sa_index::EmbeddingProvider>,
    pub audit: Arc<AuditLog>,
}

/// Top-level axum state. Config and family are loaded once at startup into
/// an immutable snapshot — there is no hot reload.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub family: Arc<FamilyConfig>,
    pub services: Arc<Services>,
}
