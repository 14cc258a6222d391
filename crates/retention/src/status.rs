use sa_domain::config::{PolicyPreset, RetentionConfig};

use crate::pipeline::PipelineCounts;

#[derive(Debug, Clone)]
pub struct LastError {
    pub scope_id: String,
    pub file_ref: String,
    pub message: String,
    pub at_ms: i64,
}

#[derive(Debug, Clone, Default)]
pub struct LastRunSummary {
    pub scope_count: usize,
    pub stale_count: usize,
    pub candidate_count: usize,
    pub attempted_count: usize,
    pub deleted_count: usize,
    pub failed_count: usize,
    pub dry_run: bool,
    pub skipped_dry_run_count: usize,
    pub skipped_in_progress_count: usize,
    pub protected_recent_count: usize,
    pub deferred_by_run_cap_count: usize,
    pub deferred_by_scope_cap_count: usize,
    pub excluded_by_allow_count: usize,
    pub excluded_by_deny_count: usize,
    pub excluded_by_preset_count: usize,
    pub excluded_by_uploader_count: usize,
    pub excluded_by_type_count: usize,
    pub excluded_by_date_count: usize,
}

impl LastRunSummary {
    pub fn from_counts(counts: PipelineCounts, dry_run: bool) -> Self {
        Self {
            scope_count: counts.scope_count,
            stale_count: counts.stale_count,
            candidate_count: counts.candidate_count,
            attempted_count: 0,
            deleted_count: 0,
            failed_count: 0,
            dry_run,
            skipped_dry_run_count: 0,
            skipped_in_progress_count: counts.skipped_in_progress_count,
            protected_recent_count: counts.protected_recent_count,
            deferred_by_run_cap_count: counts.deferred_by_run_cap_count,
            deferred_by_scope_cap_count: counts.deferred_by_scope_cap_count,
            excluded_by_allow_count: counts.excluded_by_allow_count,
            excluded_by_deny_count: counts.excluded_by_deny_count,
            excluded_by_preset_count: counts.excluded_by_preset_count,
            excluded_by_uploader_count: counts.excluded_by_uploader_count,
            excluded_by_type_count: counts.excluded_by_type_count,
            excluded_by_date_count: counts.excluded_by_date_count,
        }
    }
}

/// Deep-copyable snapshot of scheduler state, handed to callers so they
/// cannot mutate the scheduler's internal bookkeeping through the read path.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub interval_minutes: f64,
    pub max_age_days: u32,
    pub delete_openai_files: bool,
    pub max_files_per_run: u32,
    pub dry_run: bool,
    pub keep_recent_per_scope: u32,
    pub max_deletes_per_scope_per_run: u32,
    pub allow_scope_ids: Vec<String>,
    pub deny_scope_ids: Vec<String>,
    pub policy_preset: PolicyPreset,
    pub running: bool,
    pub last_run_started_at_ms: Option<i64>,
    pub last_run_finished_at_ms: Option<i64>,
    pub last_success_at_ms: Option<i64>,
    pub total_runs: u64,
    pub total_deleted: u64,
    pub total_failures: u64,
    pub last_error: Option<LastError>,
    pub last_run_summary: Option<LastRunSummary>,
}

impl StatusSnapshot {
    pub fn initial(config: &RetentionConfig) -> Self {
        Self {
            enabled: config.enabled,
            interval_minutes: config.interval_ms as f64 / 60_000.0,
            max_age_days: config.max_age_days,
            delete_openai_files: config.delete_openai_files,
            max_files_per_run: config.max_files_per_run,
            dry_run: config.dry_run,
            keep_recent_per_scope: config.keep_recent_per_scope,
            max_deletes_per_scope_per_run: config.max_deletes_per_scope_per_run,
            allow_scope_ids: config.allow_scope_ids.clone(),
            deny_scope_ids: config.deny_scope_ids.clone(),
            policy_preset: config.policy_preset,
            running: false,
            last_run_started_at_ms: None,
            last_run_finished_at_ms: None,
            last_success_at_ms: None,
            total_runs: 0,
            total_deleted: 0,
            total_failures: 0,
            last_error: None,
            last_run_summary: None,
        }
    }
}
