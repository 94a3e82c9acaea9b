//! Symbol lifecycle controller
//!
//! Owns the symbol table. Every state change goes through `evaluate` or
//! `on_job_finished`; nothing else writes a `SymbolRecord`.
//!
//! Decision order for one symbol:
//! 1. trained in the consulted snapshot ⇒ ACTIVE
//! 2. history unreadable ⇒ BLOCKED_ERROR for this tick
//! 3. not enough history ⇒ BLOCKED_SHORT_HISTORY (never queued)
//! 4. a job is already pending, or its published revision has not been loaded yet
//!    ⇒ QUEUED_FOR_TRAINING
//! 5. cool-down after a failed job ⇒ keep the blocked state
//! 6. auto-training on and submissions accepted ⇒ submit, QUEUED_FOR_TRAINING
//! 7. otherwise ⇒ BLOCKED_UNTRAINED

use super::history::{HistoryMetrics, HistorySource};
use super::state::{SymbolRecord, SymbolState};
use crate::config::{ModelConfig, TrainingConfig};
use crate::logger::{self, LogTag};
use crate::models::ModelSnapshot;
use crate::training::{FinishedJob, JobStatus, TrainingSubmitter};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub auto_train: bool,
    pub min_history_days_to_train: u32,
    pub min_history_coverage_pct: f64,
    pub retry_cooldown: Duration,
}

impl ControllerSettings {
    pub fn from_config(model: &ModelConfig, training: &TrainingConfig) -> Self {
        Self {
            auto_train: model.auto_train_new_symbols,
            min_history_days_to_train: model.min_history_days_to_train,
            min_history_coverage_pct: model.min_history_coverage_pct,
            retry_cooldown: Duration::seconds(training.retry_cooldown_secs as i64),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default(), &TrainingConfig::default())
    }
}

pub struct SymbolController {
    settings: ControllerSettings,
    records: BTreeMap<String, SymbolRecord>,
}

impl SymbolController {
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            settings,
            records: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn evaluate(
        &mut self,
        symbol: &str,
        snapshot: &ModelSnapshot,
        history: &dyn HistorySource,
        submitter: &mut dyn TrainingSubmitter,
    ) -> SymbolState {
        self.evaluate_at(symbol, snapshot, history, submitter, Utc::now())
    }

    pub fn evaluate_at(
        &mut self,
        symbol: &str,
        snapshot: &ModelSnapshot,
        history: &dyn HistorySource,
        submitter: &mut dyn TrainingSubmitter,
        now: DateTime<Utc>,
    ) -> SymbolState {
        let version_id = snapshot.version_id();
        let prior = self.records.get(symbol).map(|r| r.state);
        let record = self
            .records
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolRecord::new(symbol));
        record.model_revision_seen = snapshot.revision();

        let (next, reason) = if snapshot.is_trained(symbol) {
            record.last_error = None;
            record.retry_after = None;
            record.awaiting_revision = None;
            (SymbolState::Active, "trained in current model".to_string())
        } else if let Some(awaiting) = record
            .awaiting_revision
            .filter(|revision| *revision > snapshot.revision())
        {
            (
                SymbolState::QueuedForTraining,
                format!("published r{}, waiting for reload", awaiting),
            )
        } else {
            record.awaiting_revision = None;
            match history.history_metrics(symbol) {
                Err(e) => {
                    record.last_error = Some(e.to_string());
                    (SymbolState::BlockedError, format!("history unavailable: {}", e))
                }
                Ok(metrics) => {
                    record.history_coverage_pct = metrics.coverage_pct;
                    record.available_days = metrics.available_days;
                    Self::decide_untrained(&self.settings, record, &metrics, symbol, submitter, now)
                }
            }
        };

        record.state = next;
        record.updated_at = now;

        if prior != Some(next) {
            logger::info(
                LogTag::Symbols,
                &format!(
                    "{} {} {} -> {} [model {}] ({})",
                    next.emoji(),
                    symbol,
                    prior.map(|s| s.to_string()).unwrap_or_else(|| "NEW".to_string()),
                    next,
                    version_id,
                    reason
                ),
            );
        } else {
            logger::debug(
                LogTag::Symbols,
                &format!("{} stays {} [model {}] ({})", symbol, next, version_id, reason),
            );
        }

        next
    }

    fn decide_untrained(
        settings: &ControllerSettings,
        record: &mut SymbolRecord,
        metrics: &HistoryMetrics,
        symbol: &str,
        submitter: &mut dyn TrainingSubmitter,
        now: DateTime<Utc>,
    ) -> (SymbolState, String) {
        if metrics.available_days < settings.min_history_days_to_train
            || metrics.coverage_pct < settings.min_history_coverage_pct
        {
            return (
                SymbolState::BlockedShortHistory,
                format!(
                    "{}d at {:.1}% coverage, need {}d at {:.1}%",
                    metrics.available_days,
                    metrics.coverage_pct * 100.0,
                    settings.min_history_days_to_train,
                    settings.min_history_coverage_pct * 100.0
                ),
            );
        }

        if submitter.is_pending(symbol) {
            return (SymbolState::QueuedForTraining, "training job pending".to_string());
        }

        if record.in_cooldown(now) {
            let held = match record.state {
                SymbolState::BlockedShortHistory => SymbolState::BlockedShortHistory,
                _ => SymbolState::BlockedError,
            };
            let until = record
                .retry_after
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            return (held, format!("retry cool-down until {}", until));
        }

        if !settings.auto_train {
            return (SymbolState::BlockedUntrained, "auto-training disabled".to_string());
        }
        if !submitter.accepts_submissions() {
            return (SymbolState::BlockedUntrained, "training submissions halted".to_string());
        }

        let outcome = submitter.submit(symbol, metrics.available_days);
        if outcome.accepted() {
            (SymbolState::QueuedForTraining, format!("training submitted ({:?})", outcome))
        } else {
            (SymbolState::BlockedUntrained, format!("submission refused ({:?})", outcome))
        }
    }

    /// Apply a terminal training job to the symbol's record
    pub fn on_job_finished(&mut self, job: &FinishedJob) {
        self.on_job_finished_at(job, Utc::now())
    }

    pub fn on_job_finished_at(&mut self, job: &FinishedJob, now: DateTime<Utc>) {
        let Some(record) = self.records.get_mut(&job.symbol) else {
            logger::debug(
                LogTag::Symbols,
                &format!("Finished job for {} which left the universe", job.symbol),
            );
            return;
        };

        match (&job.status, &job.result) {
            (JobStatus::Succeeded, Ok(metadata)) => {
                record.state = SymbolState::QueuedForTraining;
                record.last_error = None;
                record.retry_after = None;
                record.awaiting_revision = Some(metadata.revision);
                record.updated_at = now;
                logger::info(
                    LogTag::Symbols,
                    &format!(
                        "✅ {} training published as {}, activation on next reload",
                        job.symbol,
                        metadata.version_id()
                    ),
                );
            }
            (_, Err(err)) if err.is_concurrency_conflict() => {
                record.state = SymbolState::BlockedUntrained;
                record.last_error = Some(err.to_string());
                record.updated_at = now;
                logger::warning(
                    LogTag::Symbols,
                    &format!("🔒 {} publish lost the lock race, will resubmit: {}", job.symbol, err),
                );
            }
            (_, Err(err)) => {
                let state = if err.is_insufficient_data() {
                    SymbolState::BlockedShortHistory
                } else {
                    SymbolState::BlockedError
                };
                record.state = state;
                record.last_error = Some(err.to_string());
                record.retry_after = Some(now + self.settings.retry_cooldown);
                record.updated_at = now;
                logger::warning(
                    LogTag::Symbols,
                    &format!(
                        "{} {} training failed -> {} until {}: {}",
                        state.emoji(),
                        job.symbol,
                        state,
                        (now + self.settings.retry_cooldown).format("%Y-%m-%d %H:%M:%S"),
                        err
                    ),
                );
            }
            (status, Ok(_)) => {
                logger::warning(
                    LogTag::Symbols,
                    &format!("{} job finished with status {:?} but a result", job.symbol, status),
                );
            }
        }
    }

    /// Whether evaluating `symbol` against `snapshot` reads candle history
    pub fn needs_history(&self, symbol: &str, snapshot: &ModelSnapshot) -> bool {
        if snapshot.is_trained(symbol) {
            return false;
        }
        !self
            .records
            .get(symbol)
            .and_then(|r| r.awaiting_revision)
            .map(|revision| revision > snapshot.revision())
            .unwrap_or(false)
    }

    /// ACTIVE in the table and trained in the consulted snapshot
    pub fn is_tradable(&self, symbol: &str, snapshot: &ModelSnapshot) -> bool {
        self.records
            .get(symbol)
            .map(|r| r.state.is_tradable())
            .unwrap_or(false)
            && snapshot.is_trained(symbol)
    }

    pub fn state_of(&self, symbol: &str) -> Option<SymbolState> {
        self.records.get(symbol).map(|r| r.state)
    }

    pub fn record(&self, symbol: &str) -> Option<&SymbolRecord> {
        self.records.get(symbol)
    }

    pub fn records(&self) -> impl Iterator<Item = &SymbolRecord> {
        self.records.values()
    }

    /// Drop records for symbols no longer in the universe; returns the removed symbols
    pub fn retain_universe(&mut self, universe: &[String]) -> Vec<String> {
        let keep: HashSet<&str> = universe.iter().map(String::as_str).collect();
        let removed: Vec<String> = self
            .records
            .keys()
            .filter(|s| !keep.contains(s.as_str()))
            .cloned()
            .collect();
        for symbol in &removed {
            self.records.remove(symbol);
            logger::info(LogTag::Symbols, &format!("➖ {} removed from universe", symbol));
        }
        removed
    }

    pub fn summary(&self) -> BTreeMap<SymbolState, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records.values() {
            *counts.entry(record.state).or_insert(0) += 1;
        }
        counts
    }

    /// Symbols blocked only by the absence of a trained model
    pub fn symbols_awaiting_training(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|r| r.state == SymbolState::BlockedUntrained)
            .map(|r| r.symbol.clone())
            .collect()
    }

    pub fn active_symbols(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|r| r.state == SymbolState::Active)
            .map(|r| r.symbol.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{BotError, BotResult};
    use crate::models::ModelMetadata;
    use crate::training::{JobError, SubmitOutcome, TrainingFailure};
    use std::collections::HashMap;

    struct FakeHistory(HashMap<String, HistoryMetrics>);

    impl FakeHistory {
        fn with(entries: &[(&str, u32, f64)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(s, d, c)| (s.to_string(), HistoryMetrics::new(*d, *c)))
                    .collect(),
            )
        }
    }

    impl HistorySource for FakeHistory {
        fn history_metrics(&self, symbol: &str) -> BotResult<HistoryMetrics> {
            self.0
                .get(symbol)
                .copied()
                .ok_or_else(|| BotError::integrity(symbol, "no history"))
        }
    }

    #[derive(Default)]
    struct FakeSubmitter {
        pending: HashSet<String>,
        halted: bool,
        submitted: Vec<String>,
        days: Vec<u32>,
    }

    impl TrainingSubmitter for FakeSubmitter {
        fn is_pending(&self, symbol: &str) -> bool {
            self.pending.contains(symbol)
        }

        fn accepts_submissions(&self) -> bool {
            !self.halted
        }

        fn submit(&mut self, symbol: &str, available_days: u32) -> SubmitOutcome {
            if self.halted {
                return SubmitOutcome::Halted;
            }
            if !self.pending.insert(symbol.to_string()) {
                return SubmitOutcome::AlreadyPending;
            }
            self.submitted.push(symbol.to_string());
            self.days.push(available_days);
            SubmitOutcome::Started
        }
    }

    fn snapshot_with(symbols: &[&str], revision: u64) -> ModelSnapshot {
        let mut metadata = ModelMetadata::empty("1.0");
        metadata.revision = revision;
        for s in symbols {
            metadata.trained_symbols.insert(s.to_string());
        }
        ModelSnapshot::new(metadata, Vec::new(), Vec::new())
    }

    fn finished(symbol: &str, result: Result<ModelMetadata, JobError>) -> FinishedJob {
        FinishedJob {
            symbol: symbol.to_string(),
            status: if result.is_ok() { JobStatus::Succeeded } else { JobStatus::Failed },
            result,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_short_history_is_never_queued() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("NEWUSDT", 60, 1.0)]);
        let mut submitter = FakeSubmitter::default();
        let snapshot = snapshot_with(&[], 0);

        for _ in 0..3 {
            let state = controller.evaluate("NEWUSDT", &snapshot, &history, &mut submitter);
            assert_eq!(state, SymbolState::BlockedShortHistory);
        }
        assert!(submitter.submitted.is_empty());
        assert_eq!(controller.record("NEWUSDT").unwrap().available_days, 60);
    }

    #[test]
    fn test_low_coverage_blocks_like_short_history() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("GAPUSDT", 400, 0.5)]);
        let mut submitter = FakeSubmitter::default();
        let state = controller.evaluate("GAPUSDT", &snapshot_with(&[], 0), &history, &mut submitter);
        assert_eq!(state, SymbolState::BlockedShortHistory);
        assert!(submitter.submitted.is_empty());
    }

    #[test]
    fn test_untrained_symbol_is_queued_then_activated_after_reload() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("ETHUSDT", 120, 1.0)]);
        let mut submitter = FakeSubmitter::default();

        let before = snapshot_with(&[], 0);
        let state = controller.evaluate("ETHUSDT", &before, &history, &mut submitter);
        assert_eq!(state, SymbolState::QueuedForTraining);
        assert_eq!(submitter.submitted, vec!["ETHUSDT".to_string()]);
        assert!(!controller.is_tradable("ETHUSDT", &before));

        // job drained, then the loop reloads before evaluating
        submitter.pending.clear();
        let after = snapshot_with(&["ETHUSDT"], 1);
        let state = controller.evaluate("ETHUSDT", &after, &history, &mut submitter);
        assert_eq!(state, SymbolState::Active);
        assert_eq!(submitter.submitted.len(), 1);
        assert!(controller.is_tradable("ETHUSDT", &after));
        assert_eq!(controller.record("ETHUSDT").unwrap().model_revision_seen, 1);
    }

    #[test]
    fn test_pending_job_is_not_resubmitted() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("ETHUSDT", 120, 1.0)]);
        let mut submitter = FakeSubmitter::default();
        let snapshot = snapshot_with(&[], 0);

        for _ in 0..5 {
            controller.evaluate("ETHUSDT", &snapshot, &history, &mut submitter);
        }
        assert_eq!(submitter.submitted.len(), 1);
    }

    #[test]
    fn test_active_requires_snapshot_membership() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[]);
        let mut submitter = FakeSubmitter::default();
        let trained = snapshot_with(&["BTCUSDT"], 3);
        controller.evaluate("BTCUSDT", &trained, &history, &mut submitter);

        assert!(controller.is_tradable("BTCUSDT", &trained));
        assert!(!controller.is_tradable("BTCUSDT", &snapshot_with(&[], 0)));
    }

    #[test]
    fn test_missing_history_blocks_for_the_tick() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let mut submitter = FakeSubmitter::default();
        let snapshot = snapshot_with(&[], 0);

        let state = controller.evaluate("XUSDT", &snapshot, &FakeHistory::with(&[]), &mut submitter);
        assert_eq!(state, SymbolState::BlockedError);
        assert!(controller.record("XUSDT").unwrap().last_error.is_some());

        let history = FakeHistory::with(&[("XUSDT", 200, 1.0)]);
        let state = controller.evaluate("XUSDT", &snapshot, &history, &mut submitter);
        assert_eq!(state, SymbolState::QueuedForTraining);
    }

    #[test]
    fn test_halted_or_disabled_training_stays_untrained() {
        let history = FakeHistory::with(&[("ETHUSDT", 120, 1.0)]);
        let snapshot = snapshot_with(&[], 0);

        let mut controller = SymbolController::new(ControllerSettings::default());
        let mut halted = FakeSubmitter {
            halted: true,
            ..Default::default()
        };
        assert_eq!(
            controller.evaluate("ETHUSDT", &snapshot, &history, &mut halted),
            SymbolState::BlockedUntrained
        );

        let mut settings = ControllerSettings::default();
        settings.auto_train = false;
        let mut controller = SymbolController::new(settings);
        let mut submitter = FakeSubmitter::default();
        assert_eq!(
            controller.evaluate("ETHUSDT", &snapshot, &history, &mut submitter),
            SymbolState::BlockedUntrained
        );
        assert!(submitter.submitted.is_empty());
        assert_eq!(controller.symbols_awaiting_training(), vec!["ETHUSDT".to_string()]);
    }

    #[test]
    fn test_failed_job_enters_cooldown() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("ETHUSDT", 120, 1.0)]);
        let mut submitter = FakeSubmitter::default();
        let snapshot = snapshot_with(&[], 0);
        let now = Utc::now();

        controller.evaluate_at("ETHUSDT", &snapshot, &history, &mut submitter, now);
        submitter.pending.clear();
        controller.on_job_finished_at(
            &finished(
                "ETHUSDT",
                Err(JobError::Training(TrainingFailure::TrainerError("boom".to_string()))),
            ),
            now,
        );
        assert_eq!(controller.state_of("ETHUSDT"), Some(SymbolState::BlockedError));

        let state = controller.evaluate_at("ETHUSDT", &snapshot, &history, &mut submitter, now + Duration::minutes(10));
        assert_eq!(state, SymbolState::BlockedError);
        assert_eq!(submitter.submitted.len(), 1);

        let state = controller.evaluate_at("ETHUSDT", &snapshot, &history, &mut submitter, now + Duration::hours(2));
        assert_eq!(state, SymbolState::QueuedForTraining);
        assert_eq!(submitter.submitted.len(), 2);
    }

    #[test]
    fn test_insufficient_data_failure_holds_short_history() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("ETHUSDT", 120, 1.0)]);
        let mut submitter = FakeSubmitter::default();
        let snapshot = snapshot_with(&[], 0);
        let now = Utc::now();

        controller.evaluate_at("ETHUSDT", &snapshot, &history, &mut submitter, now);
        submitter.pending.clear();
        controller.on_job_finished_at(
            &finished(
                "ETHUSDT",
                Err(JobError::Training(TrainingFailure::InsufficientData("gaps".to_string()))),
            ),
            now,
        );
        let state = controller.evaluate_at("ETHUSDT", &snapshot, &history, &mut submitter, now + Duration::minutes(1));
        assert_eq!(state, SymbolState::BlockedShortHistory);
    }

    #[test]
    fn test_lock_conflict_returns_to_untrained_without_cooldown() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("ETHUSDT", 120, 1.0)]);
        let mut submitter = FakeSubmitter::default();
        let snapshot = snapshot_with(&[], 0);

        controller.evaluate("ETHUSDT", &snapshot, &history, &mut submitter);
        submitter.pending.clear();
        controller.on_job_finished(&finished(
            "ETHUSDT",
            Err(JobError::Publish(BotError::ConcurrencyConflict {
                path: "lock".to_string(),
                attempts: 10,
            })),
        ));
        assert_eq!(controller.state_of("ETHUSDT"), Some(SymbolState::BlockedUntrained));
        assert!(controller.record("ETHUSDT").unwrap().retry_after.is_none());

        let state = controller.evaluate("ETHUSDT", &snapshot, &history, &mut submitter);
        assert_eq!(state, SymbolState::QueuedForTraining);
        assert_eq!(submitter.submitted.len(), 2);
    }

    #[test]
    fn test_retain_universe_and_summary() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("ETHUSDT", 120, 1.0), ("NEWUSDT", 10, 1.0)]);
        let mut submitter = FakeSubmitter::default();
        let snapshot = snapshot_with(&["BTCUSDT"], 1);
        for s in ["BTCUSDT", "ETHUSDT", "NEWUSDT"] {
            controller.evaluate(s, &snapshot, &history, &mut submitter);
        }

        let summary = controller.summary();
        assert_eq!(summary[&SymbolState::Active], 1);
        assert_eq!(summary[&SymbolState::QueuedForTraining], 1);
        assert_eq!(summary[&SymbolState::BlockedShortHistory], 1);

        let removed = controller.retain_universe(&["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
        assert_eq!(removed, vec!["NEWUSDT".to_string()]);
        assert!(controller.state_of("NEWUSDT").is_none());
        assert_eq!(controller.active_symbols(), vec!["BTCUSDT".to_string()]);
    }

    fn published(revision: u64) -> ModelMetadata {
        let mut metadata = ModelMetadata::empty("1.0");
        metadata.revision = revision;
        metadata
    }

    #[test]
    fn test_published_symbol_waits_for_reload_without_resubmitting() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("SOLUSDT", 120, 1.0)]);
        let mut submitter = FakeSubmitter::default();
        let stale = snapshot_with(&[], 0);

        controller.evaluate("SOLUSDT", &stale, &history, &mut submitter);
        submitter.pending.clear();
        controller.on_job_finished(&finished("SOLUSDT", Ok(published(1))));
        assert_eq!(controller.record("SOLUSDT").unwrap().awaiting_revision, Some(1));
        assert!(!controller.needs_history("SOLUSDT", &stale));

        // reload failed: the loop keeps consulting the stale snapshot
        for _ in 0..3 {
            let state = controller.evaluate("SOLUSDT", &stale, &history, &mut submitter);
            assert_eq!(state, SymbolState::QueuedForTraining);
        }
        assert_eq!(submitter.submitted.len(), 1);

        let reloaded = snapshot_with(&["SOLUSDT"], 1);
        let state = controller.evaluate("SOLUSDT", &reloaded, &history, &mut submitter);
        assert_eq!(state, SymbolState::Active);
        assert!(controller.record("SOLUSDT").unwrap().awaiting_revision.is_none());
    }

    #[test]
    fn test_reloaded_revision_without_symbol_allows_resubmission() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("SOLUSDT", 120, 1.0)]);
        let mut submitter = FakeSubmitter::default();

        controller.evaluate("SOLUSDT", &snapshot_with(&[], 0), &history, &mut submitter);
        submitter.pending.clear();
        controller.on_job_finished(&finished("SOLUSDT", Ok(published(2))));

        // a newer revision that still lacks the symbol no longer holds it back
        let state = controller.evaluate("SOLUSDT", &snapshot_with(&["BTCUSDT"], 3), &history, &mut submitter);
        assert_eq!(state, SymbolState::QueuedForTraining);
        assert_eq!(submitter.submitted.len(), 2);
        assert!(controller.record("SOLUSDT").unwrap().awaiting_revision.is_none());
    }

    #[test]
    fn test_submission_carries_available_days() {
        let mut controller = SymbolController::new(ControllerSettings::default());
        let history = FakeHistory::with(&[("ETHUSDT", 120, 1.0)]);
        let mut submitter = FakeSubmitter::default();

        controller.evaluate("ETHUSDT", &snapshot_with(&[], 0), &history, &mut submitter);
        assert_eq!(submitter.days, vec![120]);
    }
}
