//! Background training scheduler
//!
//! Owns the queued/running jobs. At most one job per symbol exists at any time and at
//! most `max_concurrent` workers run on tokio's blocking pool. Workers train, publish
//! through the model store and report their status; they never touch the live model
//! handle. The orchestration loop calls `drain_finished` to collect terminal jobs,
//! which also starts queued jobs as capacity frees up.

use super::job::{FinishedJob, JobError, JobResult, JobStatus, JobView, TrainingJob};
use super::trainer::ModelTrainer;
use super::{SubmitOutcome, TrainingSubmitter};
use crate::logger::{self, LogTag};
use crate::models::ModelStore;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub struct TrainingScheduler {
    trainer: Arc<dyn ModelTrainer>,
    store: Arc<ModelStore>,
    jobs: HashMap<String, TrainingJob>,
    waiting: VecDeque<String>,
    max_concurrent: usize,
    history_days: u32,
    halted: bool,
}

impl TrainingScheduler {
    pub fn new(
        trainer: Arc<dyn ModelTrainer>,
        store: Arc<ModelStore>,
        max_concurrent: usize,
        history_days: u32,
    ) -> Self {
        Self {
            trainer,
            store,
            jobs: HashMap::new(),
            waiting: VecDeque::new(),
            max_concurrent: max_concurrent.max(1),
            history_days,
            halted: false,
        }
    }

    /// Submit a job for `symbol` with an explicit history window
    ///
    /// Idempotent: a symbol with a queued or running job is left alone.
    pub fn submit_with_days(&mut self, symbol: &str, history_days: u32) -> SubmitOutcome {
        if self.halted {
            logger::debug(
                LogTag::Training,
                &format!("Submission for {} refused: scheduler halted", symbol),
            );
            return SubmitOutcome::Halted;
        }
        if self.jobs.contains_key(symbol) {
            return SubmitOutcome::AlreadyPending;
        }

        self.jobs
            .insert(symbol.to_string(), TrainingJob::queued(symbol, history_days));

        if self.running_count() < self.max_concurrent {
            self.start(symbol);
            SubmitOutcome::Started
        } else {
            self.waiting.push_back(symbol.to_string());
            logger::info(
                LogTag::Training,
                &format!(
                    "⏳ {} queued for training ({} waiting, {} running)",
                    symbol,
                    self.waiting.len(),
                    self.running_count()
                ),
            );
            SubmitOutcome::Queued
        }
    }

    fn start(&mut self, symbol: &str) {
        let Some(job) = self.jobs.get_mut(symbol) else {
            return;
        };

        let trainer = Arc::clone(&self.trainer);
        let store = Arc::clone(&self.store);
        let status = job.status.clone();
        let worker_symbol = job.symbol.clone();
        let history_days = job.history_days;

        status.set(JobStatus::Running);
        job.started_at = Some(Utc::now());

        logger::info(
            LogTag::Training,
            &format!("🧠 Training started for {} ({} days)", symbol, history_days),
        );

        job.handle = Some(tokio::task::spawn_blocking(move || {
            let result: JobResult = trainer
                .train(&worker_symbol, history_days)
                .map_err(JobError::Training)
                .and_then(|artifact| store.publish(&artifact).map_err(JobError::Publish));

            status.set(if result.is_ok() {
                JobStatus::Succeeded
            } else {
                JobStatus::Failed
            });
            result
        }));
    }

    pub fn running_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|j| j.status.get() == JobStatus::Running)
            .count()
    }

    pub fn queued_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn status_of(&self, symbol: &str) -> Option<JobStatus> {
        self.jobs.get(symbol).map(|j| j.status.get())
    }

    pub fn has_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Stop accepting and starting jobs; running workers finish normally
    pub fn halt_new_submissions(&mut self) {
        if !self.halted {
            self.halted = true;
            logger::warning(
                LogTag::Training,
                &format!(
                    "🛑 Training halted ({} running will finish, {} waiting held)",
                    self.running_count(),
                    self.waiting.len()
                ),
            );
        }
    }

    pub fn resume_submissions(&mut self) {
        if self.halted {
            self.halted = false;
            logger::info(LogTag::Training, "▶️ Training submissions resumed");
            self.start_waiting();
        }
    }

    fn start_waiting(&mut self) {
        while !self.halted && self.running_count() < self.max_concurrent {
            let Some(symbol) = self.waiting.pop_front() else {
                break;
            };
            self.start(&symbol);
        }
    }

    /// Collect terminal jobs and start waiting ones into the freed capacity
    pub async fn drain_finished(&mut self) -> Vec<FinishedJob> {
        let finished_symbols: Vec<String> = self
            .jobs
            .values()
            .filter(|j| j.is_finished())
            .map(|j| j.symbol.clone())
            .collect();

        let mut finished = Vec::with_capacity(finished_symbols.len());
        for symbol in finished_symbols {
            let Some(mut job) = self.jobs.remove(&symbol) else {
                continue;
            };
            let result = match job.handle.take() {
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(JobError::Aborted(e.to_string())),
                },
                None => Err(JobError::Aborted("job had no worker".to_string())),
            };

            let status = if result.is_ok() {
                JobStatus::Succeeded
            } else {
                JobStatus::Failed
            };
            job.status.set(status);

            match &result {
                Ok(metadata) => logger::info(
                    LogTag::Training,
                    &format!("✅ Training finished for {} -> {}", symbol, metadata.version_id()),
                ),
                Err(e) => logger::warning(
                    LogTag::Training,
                    &format!("❌ Training failed for {}: {}", symbol, e),
                ),
            }

            finished.push(FinishedJob {
                symbol,
                status,
                result,
                started_at: job.started_at,
                finished_at: Utc::now(),
            });
        }

        self.start_waiting();
        finished
    }

    /// Drain until no worker is running (waiting jobs held by a halt are left queued)
    pub async fn wait_for_running(&mut self, poll: Duration) -> Vec<FinishedJob> {
        let mut all = Vec::new();
        loop {
            all.extend(self.drain_finished().await);
            if self.jobs.values().all(|j| j.handle.is_none()) {
                return all;
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub fn job_views(&self) -> Vec<JobView> {
        let mut views: Vec<JobView> = self.jobs.values().map(JobView::from).collect();
        views.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        views
    }
}

impl TrainingSubmitter for TrainingScheduler {
    /// Undrained terminal jobs still count as pending until the loop collects them
    fn is_pending(&self, symbol: &str) -> bool {
        self.jobs.contains_key(symbol)
    }

    fn accepts_submissions(&self) -> bool {
        !self.halted
    }

    fn submit(&mut self, symbol: &str, available_days: u32) -> SubmitOutcome {
        let days = available_days.min(self.history_days);
        self.submit_with_days(symbol, days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetadataFragment, TrainedArtifact};
    use crate::training::trainer::TrainingFailure;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Trainer that blocks until released, counting calls per symbol
    struct GatedTrainer {
        open: AtomicBool,
        calls: Mutex<Vec<String>>,
        fail_for: Option<String>,
    }

    impl GatedTrainer {
        fn new(open: bool) -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(open),
                calls: Mutex::new(Vec::new()),
                fail_for: None,
            })
        }
    }

    impl ModelTrainer for GatedTrainer {
        fn train(&self, symbol: &str, history_days: u32) -> Result<TrainedArtifact, TrainingFailure> {
            self.calls.lock().push(symbol.to_string());
            while !self.open.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(5));
            }
            if self.fail_for.as_deref() == Some(symbol) {
                return Err(TrainingFailure::InsufficientData("too short".to_string()));
            }
            Ok(TrainedArtifact {
                model_bytes: vec![7],
                scaler_bytes: vec![8],
                fragment: MetadataFragment::new(symbol, history_days),
            })
        }
    }

    fn scheduler(trainer: Arc<dyn ModelTrainer>, dir: &std::path::Path, max: usize) -> TrainingScheduler {
        TrainingScheduler::new(trainer, Arc::new(ModelStore::new(dir, "1.0")), max, 365)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_is_idempotent_per_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = GatedTrainer::new(false);
        let mut sched = scheduler(trainer.clone(), dir.path(), 2);

        assert_eq!(sched.submit("BTCUSDT", 400), SubmitOutcome::Started);
        assert_eq!(sched.submit("BTCUSDT", 400), SubmitOutcome::AlreadyPending);
        assert!(sched.is_pending("BTCUSDT"));

        trainer.open.store(true, Ordering::Release);
        let finished = sched.wait_for_running(Duration::from_millis(5)).await;
        assert_eq!(finished.len(), 1);
        assert!(finished[0].result.is_ok());
        assert_eq!(trainer.calls.lock().len(), 1);
        assert!(!sched.is_pending("BTCUSDT"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrency_bound_queues_extra_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = GatedTrainer::new(false);
        let mut sched = scheduler(trainer.clone(), dir.path(), 1);

        assert_eq!(sched.submit("BTCUSDT", 400), SubmitOutcome::Started);
        assert_eq!(sched.submit("ETHUSDT", 400), SubmitOutcome::Queued);
        assert_eq!(sched.status_of("ETHUSDT"), Some(JobStatus::Queued));
        assert_eq!(sched.running_count(), 1);

        trainer.open.store(true, Ordering::Release);
        let mut finished = Vec::new();
        while finished.len() < 2 {
            finished.extend(sched.drain_finished().await);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let snapshot = ModelStore::new(dir.path(), "1.0").load_latest().unwrap();
        assert!(snapshot.is_trained("BTCUSDT"));
        assert!(snapshot.is_trained("ETHUSDT"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_halt_refuses_new_but_finishes_running() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = GatedTrainer::new(false);
        let mut sched = scheduler(trainer.clone(), dir.path(), 2);

        assert_eq!(sched.submit("BTCUSDT", 400), SubmitOutcome::Started);
        sched.halt_new_submissions();
        assert_eq!(sched.submit("ETHUSDT", 400), SubmitOutcome::Halted);
        assert!(!sched.accepts_submissions());

        trainer.open.store(true, Ordering::Release);
        let finished = sched.wait_for_running(Duration::from_millis(5)).await;
        assert_eq!(finished.len(), 1);
        assert!(finished[0].result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_is_reported_not_published() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Arc::new(GatedTrainer {
            open: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            fail_for: Some("DOGEUSDT".to_string()),
        });
        let mut sched = scheduler(trainer, dir.path(), 2);

        sched.submit("DOGEUSDT", 400);
        let finished = sched.wait_for_running(Duration::from_millis(5)).await;
        assert_eq!(finished[0].status, JobStatus::Failed);
        assert!(finished[0]
            .result
            .as_ref()
            .err()
            .map(|e| e.is_insufficient_data())
            .unwrap_or(false));
        assert!(ModelStore::new(dir.path(), "1.0").read_metadata().unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_history_window_is_capped_by_available_days() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = GatedTrainer::new(true);
        let mut sched = scheduler(trainer, dir.path(), 2);

        sched.submit("ETHUSDT", 120);
        sched.submit("BTCUSDT", 2_000);
        let finished = sched.wait_for_running(Duration::from_millis(5)).await;
        assert_eq!(finished.len(), 2);

        let metadata = ModelStore::new(dir.path(), "1.0").read_metadata().unwrap().unwrap();
        assert_eq!(metadata.symbol_history_days["ETHUSDT"], 120);
        assert_eq!(metadata.symbol_history_days["BTCUSDT"], 365);
    }
}
