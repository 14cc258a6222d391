use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level runtime config (`config.json` under HALO_HOME)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Runtime configuration for the gateway process. Distinct from
/// [`crate::config::FamilyConfig`], which is the household data contract
/// loaded separately from `config/family.json` (or a control-plane profile).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Cross-reference check over the runtime config alone — independent of
    /// [`crate::config::FamilyConfig::validate`], which checks the household
    /// document. Fatal at load when any `Error`-severity issue is present.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.workspace.root.as_os_str().is_empty() {
            issues.push(ConfigIssue {
                path: "workspace.root".into(),
                message: "must not be empty".into(),
                severity: ConfigSeverity::Error,
            });
        }

        if self.sessions.agent_id.trim().is_empty() {
            issues.push(ConfigIssue {
                path: "sessions.agent_id".into(),
                message: "must not be empty".into(),
                severity: ConfigSeverity::Error,
            });
        }

        if self.retention.enabled && !self.retention.is_usable() {
            issues.push(ConfigIssue {
                path: "retention".into(),
                message: "enabled but one of max_age_days/interval_ms/max_files_per_run/max_deletes_per_scope_per_run is zero — scheduler will treat this as disabled".into(),
                severity: ConfigSeverity::Warning,
            });
        }

        if self.index.max_retries > 10 {
            issues.push(ConfigIssue {
                path: "index.max_retries".into(),
                message: "unusually high retry count".into(),
                severity: ConfigSeverity::Warning,
            });
        }

        if self.search.min_score < 0.0 {
            issues.push(ConfigIssue {
                path: "search.min_score".into(),
                message: "must not be negative".into(),
                severity: ConfigSeverity::Error,
            });
        }

        issues
    }
}

/// Severity of a config validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

/// A single config validation issue, identifying the offending path.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub path: String,
    pub message: String,
    pub severity: ConfigSeverity,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server (admin HTTP surface)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_3210")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3210,
            host: "127.0.0.1".into(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace (HALO_HOME layout)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Root directory layout. `root` is `$HALO_HOME` (default `~/.halo`); every
/// other path is relative to it, matching §6 of the specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "d_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { root: d_root() }
    }
}

impl WorkspaceConfig {
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }
    pub fn transcripts_dir(&self) -> PathBuf {
        self.root.join("transcripts")
    }
    pub fn memory_scopes_dir(&self) -> PathBuf {
        self.root.join("memory").join("scopes")
    }
    pub fn file_memory_dir(&self) -> PathBuf {
        self.root.join("file-memory").join("scopes")
    }
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }
    pub fn incidents_dir(&self) -> PathBuf {
        self.root.join("incidents")
    }
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions & identity (scope-key routing)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_agent_id")]
    pub agent_id: String,
    #[serde(default)]
    pub dm_scope: DmScope,
    #[serde(default)]
    pub identity_links: Vec<IdentityLink>,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            agent_id: d_agent_id(),
            dm_scope: DmScope::PerChannelPeer,
            identity_links: Vec::new(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmScope {
    Main,
    PerPeer,
    #[default]
    PerChannelPeer,
    PerAccountChannelPeer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityLink {
    pub canonical: String,
    pub peer_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub daily_reset_hour: Option<u8>,
    #[serde(default)]
    pub idle_minutes: Option<u32>,
    #[serde(default)]
    pub reset_by_type: HashMap<String, ResetOverride>,
    #[serde(default)]
    pub reset_by_channel: HashMap<String, ResetOverride>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            daily_reset_hour: Some(4),
            idle_minutes: None,
            reset_by_type: HashMap::new(),
            reset_by_channel: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetOverride {
    pub daily_reset_hour: Option<u8>,
    pub idle_minutes: Option<u32>,
}

/// Metadata carried with every inbound message from the (external) chat
/// adapter, used to compute the session key.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InboundMetadata {
    pub channel: Option<String>,
    pub account_id: Option<String>,
    pub peer_id: Option<String>,
    pub group_id: Option<String>,
    pub channel_id: Option<String>,
    pub thread_id: Option<String>,
    pub is_direct: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File retention scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_30")]
    pub max_age_days: u32,
    #[serde(default = "d_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub delete_openai_files: bool,
    #[serde(default = "d_100")]
    pub max_files_per_run: u32,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub keep_recent_per_scope: u32,
    #[serde(default = "d_20")]
    pub max_deletes_per_scope_per_run: u32,
    #[serde(default)]
    pub allow_scope_ids: Vec<String>,
    #[serde(default)]
    pub deny_scope_ids: Vec<String>,
    #[serde(default)]
    pub policy_preset: PolicyPreset,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_days: 30,
            interval_ms: d_interval_ms(),
            delete_openai_files: false,
            max_files_per_run: 100,
            dry_run: false,
            keep_recent_per_scope: 0,
            max_deletes_per_scope_per_run: 20,
            allow_scope_ids: Vec::new(),
            deny_scope_ids: Vec::new(),
            policy_preset: PolicyPreset::All,
        }
    }
}

impl RetentionConfig {
    /// Invalid numerics disable the scheduler, per the specification.
    pub fn is_usable(&self) -> bool {
        self.enabled
            && self.max_age_days > 0
            && self.interval_ms > 0
            && self.max_files_per_run > 0
            && self.max_deletes_per_scope_per_run > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPreset {
    #[default]
    All,
    ParentsOnly,
    ExcludeChildren,
    Custom,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transcript / memory sync
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "d_similarity")]
    pub similarity_threshold: f64,
    #[serde(default = "d_200")]
    pub max_new_lines_per_sync: usize,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default = "d_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "d_chunk_target_tokens")]
    pub chunk_target_tokens: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.9,
            max_new_lines_per_sync: 200,
            max_retries: 2,
            base_delay_ms: 250,
            chunk_target_tokens: 400,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Semantic search (RRF fusion)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "d_rrf_k")]
    pub rrf_k: f64,
    #[serde(default = "d_weight")]
    pub vector_weight: f64,
    #[serde(default = "d_weight")]
    pub text_weight: f64,
    #[serde(default = "d_half_life")]
    pub recency_half_life_days: f64,
    #[serde(default = "d_access_weight")]
    pub access_weight: f64,
    #[serde(default = "d_min_score")]
    pub min_score: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            vector_weight: 1.0,
            text_weight: 1.0,
            recency_half_life_days: 30.0,
            access_weight: 0.1,
            min_score: 0.005,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Default value helpers (serde)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_3210() -> u16 {
    3210
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}
fn d_root() -> PathBuf {
    dirs_home_halo()
}
fn dirs_home_halo() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".halo")
}
fn d_agent_id() -> String {
    "halo".into()
}
fn d_true() -> bool {
    true
}
fn d_30() -> u32 {
    30
}
fn d_interval_ms() -> u64 {
    21_600_000 // 6h
}
fn d_100() -> u32 {
    100
}
fn d_20() -> u32 {
    20
}
fn d_similarity() -> f64 {
    0.9
}
fn d_200() -> usize {
    200
}
fn d_max_retries() -> u32 {
    2
}
fn d_base_delay_ms() -> u64 {
    250
}
fn d_chunk_target_tokens() -> usize {
    400
}
fn d_rrf_k() -> f64 {
    60.0
}
fn d_weight() -> f64 {
    1.0
}
fn d_half_life() -> f64 {
    30.0
}
fn d_access_weight() -> f64 {
    0.1
}
fn d_min_score() -> f64 {
    0.005
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_defaults_are_usable() {
        assert!(RetentionConfig::default().is_usable());
    }

    #[test]
    fn zero_max_age_days_disables_scheduler() {
        let cfg = RetentionConfig {
            max_age_days: 0,
            ..RetentionConfig::default()
        };
        assert!(!cfg.is_usable());
    }

    #[test]
    fn zero_interval_disables_scheduler() {
        let cfg = RetentionConfig {
            interval_ms: 0,
            ..RetentionConfig::default()
        };
        assert!(!cfg.is_usable());
    }

    #[test]
    fn disabled_flag_disables_scheduler() {
        let cfg = RetentionConfig {
            enabled: false,
            ..RetentionConfig::default()
        };
        assert!(!cfg.is_usable());
    }

    #[test]
    fn default_config_validates_clean() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn empty_agent_id_is_an_error() {
        let cfg = Config {
            sessions: SessionsConfig {
                agent_id: "".into(),
                ..SessionsConfig::default()
            },
            ..Config::default()
        };
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.path == "sessions.agent_id" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn unusable_but_enabled_retention_is_a_warning() {
        let cfg = Config {
            retention: RetentionConfig {
                max_age_days: 0,
                ..RetentionConfig::default()
            },
            ..Config::default()
        };
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.path == "retention" && i.severity == ConfigSeverity::Warning));
    }
}
