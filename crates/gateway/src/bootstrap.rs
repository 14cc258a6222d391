//! Config + family loading and [`AppState`] construction, extracted from
//! `main.rs` so `serve`, `doctor`, and `config` CLI subcommands can all share
//! the same boot path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use sa_domain::config::{parse_family_config, Config, ConfigSeverity, FamilyConfig};
use sa_index::{IndexStore, LexicalIndex};
use sa_registry::ScopeFileRegistryStore;
use sa_retention::RetentionScheduler;
use sa_sessions::{IdentityResolver, LifecycleManager, SessionStore, TranscriptWriter};

use crate::collaborators::{LoggingRemoteFileDeleter, LocalEmbeddingProvider};
use crate::state::{AppState, Services};

/// Resolve `HALO_HOME`, defaulting to `~/.halo`.
pub fn halo_home() -> PathBuf {
    std::env::var_os("HALO_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".halo")
        })
}

/// Load `config.json` under `home`, falling back to defaults when the file
/// does not exist. A present-but-malformed file is a hard error.
pub fn load_runtime_config(home: &Path) -> anyhow::Result<Config> {
    let path = home.join("config.json");
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config.json found, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: Config = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Resolve the family/control-plane config document path: an explicit
/// `HALO_CONTROL_PLANE_PATH` override wins, otherwise
/// `<home>/config/family.json`. `HALO_CONTROL_PLANE_PROFILE` selects a named
/// profile file under the same directory as the resolved path
/// (`<dir>/profiles/<profile>.json`) when set.
pub fn family_config_path(home: &Path) -> PathBuf {
    let base = std::env::var_os("HALO_CONTROL_PLANE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join("config").join("family.json"));

    match std::env::var("HALO_CONTROL_PLANE_PROFILE") {
        Ok(profile) if !profile.is_empty() => base
            .parent()
            .unwrap_or(Path::new("."))
            .join("profiles")
            .join(format!("{profile}.json")),
        _ => base,
    }
}

/// Load and parse the family/control-plane config document.
pub fn load_family_config(home: &Path) -> anyhow::Result<FamilyConfig> {
    let path = family_config_path(home);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_family_config(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Validate `config` and `family`, logging every issue. Returns an error
/// naming the offending document when any issue is `Error`-severity, per
/// the fatal-at-load config validation rule.
pub fn validate_configs(config: &Config, family: &FamilyConfig) -> anyhow::Result<()> {
    let config_issues = config.validate();
    for issue in &config_issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config.json: {issue}"),
            ConfigSeverity::Error => tracing::error!("config.json: {issue}"),
        }
    }
    let config_errors = config_issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    let family_issues = family.validate();
    for issue in &family_issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("family config: {issue}"),
            ConfigSeverity::Error => tracing::error!("family config: {issue}"),
        }
    }
    let family_errors = family_issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    if config_errors > 0 || family_errors > 0 {
        anyhow::bail!(
            "config validation failed: {config_errors} error(s) in config.json, \
             {family_errors} error(s) in family config"
        );
    }
    Ok(())
}

/// Build a fully-wired [`AppState`]. Shared boot path for `serve` and
/// `doctor`.
pub async fn build_app_state(config: Arc<Config>, family: Arc<FamilyConfig>) -> anyhow::Result<AppState> {
    let home = &config.workspace.root;
    std::fs::create_dir_all(home).with_context(|| format!("creating {}", home.display()))?;
    for dir in [
        config.workspace.sessions_dir(),
        config.workspace.transcripts_dir(),
        config.workspace.memory_scopes_dir(),
        config.workspace.file_memory_dir(),
        config.workspace.logs_dir(),
        config.workspace.audit_dir(),
        config.workspace.incidents_dir(),
        config.workspace.config_dir(),
    ] {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    // ── Session management ───────────────────────────────────────────
    let sessions = Arc::new(
        SessionStore::new(&config.workspace.root).context("initializing session store")?,
    );
    let identity = Arc::new(IdentityResolver::from_config(&config.sessions.identity_links));
    let lifecycle = Arc::new(LifecycleManager::new(config.sessions.lifecycle.clone()));
    let transcripts = Arc::new(TranscriptWriter::new(&config.workspace.transcripts_dir()));
    tracing::info!(
        agent_id = %config.sessions.agent_id,
        dm_scope = ?config.sessions.dm_scope,
        identity_links = identity.len(),
        "session management ready"
    );

    // ── Scope file registry ──────────────────────────────────────────
    let registry = Arc::new(ScopeFileRegistryStore::new(config.workspace.file_memory_dir()));
    let deleter: Arc<dyn sa_registry::RemoteFileDeleter> = Arc::new(LoggingRemoteFileDeleter);
    tracing::info!(root = %registry.root().display(), "scope file registry ready");

    // ── File retention scheduler ──────────────────────────────────────
    let member_roles_by_id = family
        .members
        .iter()
        .map(|m| (m.member_id.clone(), m.role))
        .collect();
    let retention = RetentionScheduler::new(
        config.retention.clone(),
        registry.clone(),
        deleter.clone(),
        member_roles_by_id,
    );
    tracing::info!(
        enabled = config.retention.enabled,
        usable = config.retention.is_usable(),
        "file retention scheduler ready"
    );

    // ── Semantic index ────────────────────────────────────────────────
    let index_path = config.workspace.root.join("index").join("index.json");
    if let Some(parent) = index_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let index = Arc::new(IndexStore::open(&index_path).context("opening semantic index store")?);
    let embedder: Arc<dyn sa_index::EmbeddingProvider> = Arc::new(LocalEmbeddingProvider);

    // The lexical index is in-memory only; rebuild it from whatever chunks
    // already live in the on-disk store so a restart doesn't silently drop
    // every chunk indexed before this process started.
    let lexical = Arc::new(LexicalIndex::new());
    for chunk in index.all_active_chunks() {
        lexical.index_chunk(chunk.chunk_idx, &chunk.content);
    }
    tracing::info!(path = %index_path.display(), "semantic index ready");

    let audit = Arc::new(crate::audit::AuditLog::new(config.workspace.audit_dir()));

    Ok(AppState {
        config,
        family,
        services: Arc::new(Services {
            sessions,
            identity,
            lifecycle,
            transcripts,
            registry,
            deleter,
            retention: Some(retention),
            index,
            lexical,
            embedder,
            audit,
        }),
    })
}

/// Spawn the long-running background tasks: periodic session flush.
pub fn spawn_background_tasks(state: &AppState) {
    {
        let sessions = state.services.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.flush() {
                    tracing::warn!(error = %e, "session store flush failed");
                }
            }
        });
    }
    tracing::info!("background tasks spawned");
}
