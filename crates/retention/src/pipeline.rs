use std::collections::{HashMap, HashSet};

use sa_domain::config::{PolicyPreset, RetentionConfig, Role};
use sa_registry::{FileRecord, FileStatus, ScopeRegistry};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeClass {
    Parent,
    Child,
    UnknownMember,
    ParentsGroup,
    Other,
}

fn classify_scope(scope_id: &str, member_roles_by_id: &HashMap<String, Role>) -> ScopeClass {
    if let Some(rest) = scope_id.strip_prefix("telegram:parents_group:") {
        let _ = rest;
        return ScopeClass::ParentsGroup;
    }
    if let Some(member_id) = scope_id.strip_prefix("telegram:dm:") {
        return match member_roles_by_id.get(member_id) {
            Some(Role::Parent) => ScopeClass::Parent,
            Some(Role::Child) => ScopeClass::Child,
            None => ScopeClass::UnknownMember,
        };
    }
    ScopeClass::Other
}

fn preset_allows(preset: PolicyPreset, class: ScopeClass) -> bool {
    match preset {
        PolicyPreset::All | PolicyPreset::Custom => true,
        PolicyPreset::ParentsOnly => matches!(class, ScopeClass::Parent | ScopeClass::ParentsGroup),
        PolicyPreset::ExcludeChildren => !matches!(class, ScopeClass::Child),
    }
}

/// Per-run metadata filters, as accepted by a manual `runNow(options)` call.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub scope_id: Option<String>,
    pub dry_run: Option<bool>,
    pub uploaded_by: Option<HashSet<String>>,
    pub extensions: Option<HashSet<String>>,
    pub mime_prefixes: Option<Vec<String>>,
    pub uploaded_after_ms: Option<i64>,
    pub uploaded_before_ms: Option<i64>,
}

impl RunOptions {
    /// Lowercases/strips leading dots from extensions and lowercases mime
    /// prefixes; swaps an inverted after/before window.
    pub fn normalized(mut self) -> Self {
        if let Some(exts) = self.extensions.take() {
            self.extensions = Some(
                exts.into_iter()
                    .map(|e| e.trim_start_matches('.').to_lowercase())
                    .collect(),
            );
        }
        if let Some(prefixes) = self.mime_prefixes.take() {
            self.mime_prefixes = Some(prefixes.into_iter().map(|p| p.to_lowercase()).collect());
        }
        if let (Some(after), Some(before)) = (self.uploaded_after_ms, self.uploaded_before_ms) {
            if after > before {
                self.uploaded_after_ms = Some(before);
                self.uploaded_before_ms = Some(after);
            }
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub scope_id: String,
    pub file_ref: String,
    pub uploaded_at_ms: i64,
    pub openai_file_id: Option<String>,
}

/// Exclusion counters for status reporting; every field names the filter
/// stage that produced it, per the admin status snapshot contract.
#[derive(Debug, Clone, Default)]
pub struct PipelineCounts {
    pub scope_count: usize,
    pub stale_count: usize,
    pub candidate_count: usize,
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

#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub candidates: Vec<Candidate>,
    pub counts: PipelineCounts,
}

fn scope_allowed_by_lists(scope_id: &str, config: &RetentionConfig) -> Result<(), ()> {
    if config.deny_scope_ids.iter().any(|s| s == scope_id) {
        return Err(());
    }
    if !config.allow_scope_ids.is_empty() && !config.allow_scope_ids.iter().any(|s| s == scope_id) {
        return Err(());
    }
    Ok(())
}

fn extension_of(filename: &str) -> Option<String> {
    filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

fn matches_run_options(record: &FileRecord, options: &RunOptions) -> Result<(), &'static str> {
    if let Some(uploaded_by) = &options.uploaded_by {
        if !uploaded_by.contains(&record.uploaded_by) {
            return Err("uploader");
        }
    }
    if let Some(extensions) = &options.extensions {
        let ext = extension_of(&record.filename);
        if ext.map(|e| !extensions.contains(&e)).unwrap_or(true) {
            return Err("type");
        }
    }
    if let Some(prefixes) = &options.mime_prefixes {
        let mime = record.mime_type.to_lowercase();
        if !prefixes.iter().any(|p| mime.starts_with(p.as_str())) {
            return Err("type");
        }
    }
    if let Some(after) = options.uploaded_after_ms {
        if record.uploaded_at_ms < after {
            return Err("date");
        }
    }
    if let Some(before) = options.uploaded_before_ms {
        if record.uploaded_at_ms > before {
            return Err("date");
        }
    }
    Ok(())
}

/// Runs the six-stage filter pipeline over a batch of scope registries,
/// producing the ordered list of deletion candidates and per-stage exclusion
/// counters for the run summary.
pub fn run_pipeline(
    config: &RetentionConfig,
    member_roles_by_id: &HashMap<String, Role>,
    scopes: &[ScopeRegistry],
    options: &RunOptions,
    now_ms: i64,
) -> PipelineResult {
    let mut counts = PipelineCounts::default();
    let mut per_scope_stale: Vec<(String, Vec<&FileRecord>)> = Vec::new();

    for registry in scopes {
        if let Some(only) = &options.scope_id {
            if &registry.scope_id != only {
                continue;
            }
        }

        match scope_allowed_by_lists(&registry.scope_id, config) {
            Err(()) if config.deny_scope_ids.iter().any(|s| s == &registry.scope_id) => {
                counts.excluded_by_deny_count += registry.files.len();
                continue;
            }
            Err(()) => {
                counts.excluded_by_allow_count += registry.files.len();
                continue;
            }
            Ok(()) => {}
        }

        let class = classify_scope(&registry.scope_id, member_roles_by_id);
        if !preset_allows(config.policy_preset, class) {
            counts.excluded_by_preset_count += registry.files.len();
            continue;
        }

        counts.scope_count += 1;

        let mut live: Vec<&FileRecord> = Vec::new();
        for record in &registry.files {
            if record.status == FileStatus::InProgress {
                counts.skipped_in_progress_count += 1;
                continue;
            }
            live.push(record);
        }

        live.sort_by(|a, b| b.uploaded_at_ms.cmp(&a.uploaded_at_ms));
        let keep = config.keep_recent_per_scope as usize;
        let (protected, rest) = if keep >= live.len() {
            (live.as_slice(), &live[0..0])
        } else {
            live.split_at(keep)
        };
        counts.protected_recent_count += protected.len();

        let stale_cutoff = now_ms - (config.max_age_days as i64) * DAY_MS;
        let stale: Vec<&FileRecord> = rest
            .iter()
            .copied()
            .filter(|r| r.uploaded_at_ms <= stale_cutoff)
            .collect();
        counts.stale_count += stale.len();

        per_scope_stale.push((registry.scope_id.clone(), stale));
    }

    let mut filtered: Vec<Candidate> = Vec::new();
    for (scope_id, records) in &per_scope_stale {
        for record in records {
            if let Err(reason) = matches_run_options(record, options) {
                match reason {
                    "uploader" => counts.excluded_by_uploader_count += 1,
                    "type" => counts.excluded_by_type_count += 1,
                    "date" => counts.excluded_by_date_count += 1,
                    _ => {}
                }
                continue;
            }
            filtered.push(Candidate {
                scope_id: scope_id.clone(),
                file_ref: record.telegram_file_unique_id.clone(),
                uploaded_at_ms: record.uploaded_at_ms,
                openai_file_id: record.openai_file_id.clone(),
            });
        }
    }

    filtered.sort_by(|a, b| a.uploaded_at_ms.cmp(&b.uploaded_at_ms));

    let mut admitted = Vec::new();
    let mut per_scope_admitted: HashMap<String, u32> = HashMap::new();
    for candidate in filtered {
        if admitted.len() as u32 >= config.max_files_per_run {
            counts.deferred_by_run_cap_count += 1;
            continue;
        }
        let scope_count = per_scope_admitted.entry(candidate.scope_id.clone()).or_insert(0);
        if *scope_count >= config.max_deletes_per_scope_per_run {
            counts.deferred_by_scope_cap_count += 1;
            continue;
        }
        *scope_count += 1;
        admitted.push(candidate);
    }

    counts.candidate_count = admitted.len();

    PipelineResult {
        candidates: admitted,
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(unique_id: &str, uploaded_at_ms: i64, status: FileStatus) -> FileRecord {
        FileRecord {
            telegram_file_id: format!("tg-{unique_id}"),
            telegram_file_unique_id: unique_id.to_string(),
            filename: "photo.jpg".into(),
            mime_type: "image/jpeg".into(),
            size_bytes: 1,
            openai_file_id: Some(format!("oai-{unique_id}")),
            vector_store_file_id: None,
            status,
            last_error: None,
            uploaded_by: "wags".into(),
            uploaded_at_ms,
            storage_metadata: None,
        }
    }

    fn days(n: i64) -> i64 {
        n * DAY_MS
    }

    #[test]
    fn retention_caps_with_protection_scenario() {
        let now_ms = days(1000);
        let mut scope_a = ScopeRegistry::new("telegram:dm:kid", 0);
        scope_a.files.push(record("telegram-unique-a-oldest", now_ms - days(90), FileStatus::Completed));
        scope_a.files.push(record("a-middle", now_ms - days(40), FileStatus::InProgress));
        scope_a.files.push(record("a-newest", now_ms - days(80), FileStatus::Completed));

        let mut scope_b = ScopeRegistry::new("telegram:dm:wags", 0);
        scope_b.files.push(record("telegram-unique-b-oldest", now_ms - days(85), FileStatus::Completed));
        scope_b.files.push(record("b-mid", now_ms - days(75), FileStatus::Completed));
        scope_b.files.push(record("b-newest", now_ms - days(70), FileStatus::Completed));

        let mut roles = HashMap::new();
        roles.insert("kid".to_string(), Role::Child);
        roles.insert("wags".to_string(), Role::Parent);

        let config = RetentionConfig {
            max_age_days: 30,
            keep_recent_per_scope: 1,
            max_files_per_run: 10,
            max_deletes_per_scope_per_run: 1,
            ..RetentionConfig::default()
        };

        let result = run_pipeline(&config, &roles, &[scope_a, scope_b], &RunOptions::default(), now_ms);

        assert_eq!(result.counts.skipped_in_progress_count, 1);
        assert_eq!(result.counts.protected_recent_count, 2);
        assert_eq!(result.counts.deferred_by_scope_cap_count, 1);
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.candidates[0].file_ref, "telegram-unique-a-oldest");
        assert_eq!(result.candidates[1].file_ref, "telegram-unique-b-oldest");
    }

    #[test]
    fn deny_list_takes_precedence_over_allow_list() {
        let now_ms = days(1000);
        let mut scope = ScopeRegistry::new("telegram:dm:wags", 0);
        scope.files.push(record("u1", now_ms - days(90), FileStatus::Completed));
        let config = RetentionConfig {
            allow_scope_ids: vec!["telegram:dm:wags".into()],
            deny_scope_ids: vec!["telegram:dm:wags".into()],
            ..RetentionConfig::default()
        };
        let result = run_pipeline(&config, &HashMap::new(), &[scope], &RunOptions::default(), now_ms);
        assert!(result.candidates.is_empty());
        assert_eq!(result.counts.excluded_by_deny_count, 1);
    }

    #[test]
    fn empty_allow_list_means_allow_all() {
        let now_ms = days(1000);
        let mut scope = ScopeRegistry::new("telegram:dm:wags", 0);
        scope.files.push(record("u1", now_ms - days(90), FileStatus::Completed));
        let config = RetentionConfig::default();
        let result = run_pipeline(&config, &HashMap::new(), &[scope], &RunOptions::default(), now_ms);
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn parents_only_preset_excludes_child_scopes() {
        let now_ms = days(1000);
        let mut scope = ScopeRegistry::new("telegram:dm:kid", 0);
        scope.files.push(record("u1", now_ms - days(90), FileStatus::Completed));
        let mut roles = HashMap::new();
        roles.insert("kid".to_string(), Role::Child);
        let config = RetentionConfig {
            policy_preset: PolicyPreset::ParentsOnly,
            ..RetentionConfig::default()
        };
        let result = run_pipeline(&config, &roles, &[scope], &RunOptions::default(), now_ms);
        assert!(result.candidates.is_empty());
        assert_eq!(result.counts.excluded_by_preset_count, 1);
    }

    #[test]
    fn in_progress_records_are_never_candidates() {
        let now_ms = days(1000);
        let mut scope = ScopeRegistry::new("telegram:dm:wags", 0);
        scope.files.push(record("u1", now_ms - days(90), FileStatus::InProgress));
        let config = RetentionConfig::default();
        let result = run_pipeline(&config, &HashMap::new(), &[scope], &RunOptions::default(), now_ms);
        assert!(result.candidates.is_empty());
        assert_eq!(result.counts.skipped_in_progress_count, 1);
    }

    #[test]
    fn run_option_scope_id_restricts_to_one_scope() {
        let now_ms = days(1000);
        let mut scope_a = ScopeRegistry::new("telegram:dm:wags", 0);
        scope_a.files.push(record("u1", now_ms - days(90), FileStatus::Completed));
        let mut scope_b = ScopeRegistry::new("telegram:dm:kid", 0);
        scope_b.files.push(record("u2", now_ms - days(90), FileStatus::Completed));
        let config = RetentionConfig::default();
        let options = RunOptions {
            scope_id: Some("telegram:dm:wags".into()),
            ..RunOptions::default()
        };
        let result = run_pipeline(&config, &HashMap::new(), &[scope_a, scope_b], &options, now_ms);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].scope_id, "telegram:dm:wags");
    }
}
