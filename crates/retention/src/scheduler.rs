use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sa_domain::config::{RetentionConfig, Role};
use sa_domain::trace::TraceEvent;
use sa_registry::{FileMemoryLifecycle, RemoteFileDeleter, ScopeFileRegistryStore};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use std::sync::Mutex as StdMutex;
use tracing::error;

use crate::pipeline::{run_pipeline, RunOptions};
use crate::status::{LastError, LastRunSummary, StatusSnapshot};

struct RunRequest {
    options: RunOptions,
    reply: oneshot::Sender<LastRunSummary>,
}

/// Interval timer + FIFO manual-run queue, single drain loop. No two runs
/// ever overlap: a scheduled tick and a concurrent manual `run_now` both
/// enqueue onto the same channel and are executed strictly in arrival order
/// by the one task that owns the receiver.
pub struct RetentionScheduler {
    config: RetentionConfig,
    tx: mpsc::UnboundedSender<RunRequest>,
    status: Arc<Mutex<StatusSnapshot>>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl RetentionScheduler {
    pub fn new(
        config: RetentionConfig,
        registry_store: Arc<ScopeFileRegistryStore>,
        deleter: Arc<dyn RemoteFileDeleter>,
        member_roles_by_id: HashMap<String, Role>,
    ) -> Arc<Self> {
        let status = Arc::new(Mutex::new(StatusSnapshot::initial(&config)));
        let (tx, rx) = mpsc::unbounded_channel();

        let scheduler = Arc::new(Self {
            config: config.clone(),
            tx,
            status: status.clone(),
            task: StdMutex::new(None),
        });

        let task = tokio::spawn(drain_loop(
            rx,
            config,
            registry_store,
            deleter,
            member_roles_by_id,
            status,
        ));
        *scheduler.task.lock().expect("task mutex poisoned") = Some(task);

        scheduler
    }

    /// Enqueues a manual run. If the scheduler is disabled, resolves
    /// immediately with a no-op summary rather than going through the queue,
    /// per the open-question resolution that `run_now` stays observable even
    /// while disabled.
    pub async fn run_now(&self, options: RunOptions) -> LastRunSummary {
        if !self.config.is_usable() {
            return LastRunSummary::default();
        }
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(RunRequest {
                options: options.normalized(),
                reply,
            })
            .is_err()
        {
            return LastRunSummary::default();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn status(&self) -> StatusSnapshot {
        self.status.lock().await.clone()
    }

    pub async fn stop(&self) {
        let task = self.task.lock().expect("task mutex poisoned").take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

async fn drain_loop(
    mut rx: mpsc::UnboundedReceiver<RunRequest>,
    config: RetentionConfig,
    registry_store: Arc<ScopeFileRegistryStore>,
    deleter: Arc<dyn RemoteFileDeleter>,
    member_roles_by_id: HashMap<String, Role>,
    status: Arc<Mutex<StatusSnapshot>>,
) {
    if !config.is_usable() {
        return;
    }
    let mut ticker = tokio::time::interval(Duration::from_millis(config.interval_ms));
    ticker.tick().await; // fires immediately on start()

    loop {
        tokio::select! {
            maybe_req = rx.recv() => {
                match maybe_req {
                    Some(req) => {
                        let summary = execute_run(&config, &registry_store, deleter.as_ref(), &member_roles_by_id, &req.options, &status).await;
                        let _ = req.reply.send(summary);
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let summary = execute_run(&config, &registry_store, deleter.as_ref(), &member_roles_by_id, &RunOptions::default(), &status).await;
                drop(summary);
            }
        }
    }
}

async fn execute_run(
    config: &RetentionConfig,
    registry_store: &ScopeFileRegistryStore,
    deleter: &dyn RemoteFileDeleter,
    member_roles_by_id: &HashMap<String, Role>,
    options: &RunOptions,
    status: &Arc<Mutex<StatusSnapshot>>,
) -> LastRunSummary {
    TraceEvent::RetentionRunStarted { trigger: "run" }.emit();
    let started_at = now_ms();
    {
        let mut guard = status.lock().await;
        guard.running = true;
        guard.last_run_started_at_ms = Some(started_at);
    }

    let scope_ids = registry_store.list_scope_ids();
    let scopes: Vec<_> = scope_ids
        .iter()
        .filter_map(|id| registry_store.read(id))
        .collect();

    let result = run_pipeline(config, member_roles_by_id, &scopes, options, started_at);
    let dry_run = options.dry_run.unwrap_or(config.dry_run);
    let mut summary = LastRunSummary::from_counts(result.counts, dry_run);

    let mut deleted_count = 0usize;
    let mut failed_count = 0usize;
    let mut last_error = None;

    if dry_run {
        summary.skipped_dry_run_count = result.candidates.len();
    } else {
        let lifecycle = FileMemoryLifecycle::new(registry_store, deleter);
        for candidate in &result.candidates {
            summary.attempted_count += 1;
            match lifecycle
                .delete(&candidate.scope_id, &candidate.file_ref, config.delete_openai_files, now_ms())
                .await
            {
                Ok(sa_registry::DeleteOutcome::Deleted) => deleted_count += 1,
                Ok(sa_registry::DeleteOutcome::ScopeNotFound | sa_registry::DeleteOutcome::FileNotFound) => {}
                Ok(sa_registry::DeleteOutcome::RemoteDeleteFailed { message }) => {
                    failed_count += 1;
                    last_error = Some(LastError {
                        scope_id: candidate.scope_id.clone(),
                        file_ref: candidate.file_ref.clone(),
                        message,
                        at_ms: now_ms(),
                    });
                }
                Err(err) => {
                    failed_count += 1;
                    error!(%err, "retention delete failed with an I/O error");
                    last_error = Some(LastError {
                        scope_id: candidate.scope_id.clone(),
                        file_ref: candidate.file_ref.clone(),
                        message: err.to_string(),
                        at_ms: now_ms(),
                    });
                }
            }
        }
    }

    summary.deleted_count = deleted_count;
    summary.failed_count = failed_count;

    let finished_at = now_ms();
    {
        let mut guard = status.lock().await;
        guard.running = false;
        guard.last_run_finished_at_ms = Some(finished_at);
        guard.total_runs += 1;
        guard.total_deleted += deleted_count as u64;
        guard.total_failures += failed_count as u64;
        if failed_count == 0 {
            guard.last_success_at_ms = Some(finished_at);
        }
        if let Some(err) = &last_error {
            guard.last_error = Some(err.clone());
        }
        guard.last_run_summary = Some(summary.clone());
    }

    TraceEvent::RetentionRunFinished {
        scope_count: summary.scope_count,
        candidate_count: summary.candidate_count,
        deleted_count: summary.deleted_count,
        failed_count: summary.failed_count,
        dry_run: summary.dry_run,
    }
    .emit();

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sa_registry::{FileRecord, FileStatus, ScopeRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysOkDeleter;
    #[async_trait]
    impl RemoteFileDeleter for AlwaysOkDeleter {
        async fn delete_vector_store_file(&self, _: &str, _: &str) -> Result<(), String> {
            Ok(())
        }
        async fn delete_openai_file(&self, _: &str) -> Result<(), String> {
            Ok(())
        }
    }

    struct BlockingDeleter {
        gate: tokio::sync::Notify,
        released: AtomicUsize,
    }
    #[async_trait]
    impl RemoteFileDeleter for BlockingDeleter {
        async fn delete_vector_store_file(&self, _: &str, _: &str) -> Result<(), String> {
            Ok(())
        }
        async fn delete_openai_file(&self, _: &str) -> Result<(), String> {
            self.gate.notified().await;
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(unique_id: &str, uploaded_at_ms: i64) -> FileRecord {
        FileRecord {
            telegram_file_id: format!("tg-{unique_id}"),
            telegram_file_unique_id: unique_id.to_string(),
            filename: "f.jpg".into(),
            mime_type: "image/jpeg".into(),
            size_bytes: 1,
            openai_file_id: Some(format!("oai-{unique_id}")),
            vector_store_file_id: None,
            status: FileStatus::Completed,
            last_error: None,
            uploaded_by: "wags".into(),
            uploaded_at_ms,
            storage_metadata: None,
        }
    }

    #[tokio::test]
    async fn disabled_scheduler_run_now_is_immediate_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScopeFileRegistryStore::new(dir.path()));
        let config = RetentionConfig {
            enabled: false,
            ..RetentionConfig::default()
        };
        let scheduler = RetentionScheduler::new(config, store, Arc::new(AlwaysOkDeleter), HashMap::new());
        let summary = scheduler.run_now(RunOptions::default()).await;
        assert_eq!(summary.candidate_count, 0);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn manual_run_deletes_stale_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScopeFileRegistryStore::new(dir.path()));
        let now = chrono::Utc::now().timestamp_millis();
        let mut registry = ScopeRegistry::new("telegram:dm:wags", now);
        registry.files.push(record("u1", now - 90 * 86_400_000));
        store.write_under_lock("telegram:dm:wags", &registry).await.unwrap();

        let config = RetentionConfig {
            interval_ms: 3_600_000,
            ..RetentionConfig::default()
        };
        let scheduler = RetentionScheduler::new(config, store.clone(), Arc::new(AlwaysOkDeleter), HashMap::new());
        let summary = scheduler.run_now(RunOptions::default()).await;
        assert_eq!(summary.deleted_count, 1);
        let registry = store.read("telegram:dm:wags").unwrap();
        assert!(registry.files.is_empty());
        scheduler.stop().await;
    }
}
