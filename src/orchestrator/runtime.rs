//! Orchestration loop
//!
//! One tokio task owns the model handle, symbol table, position book, guard and kill
//! switch; nothing else mutates them. Training workers only write to the model store.
//! Within a tick the loop always reloads the model before re-evaluating symbols.
//! Model reloads and history reads run on the blocking pool; the loop awaits them
//! without holding any shared lock.

use super::market::{CandleBuffer, MarketEvent, SignalEngine, TradeSignal};
use super::timers::LoopTimers;
use crate::config::Config;
use crate::errors::BotError;
use crate::exchange::{Candle, ExchangeClient, OrderRequest};
use crate::guard::{GuardStatus, GuardTransition, PerformanceGuard, TradeOutcome};
use crate::logger::{self, LogTag};
use crate::models::{ModelHandle, ModelSnapshot, ModelStore, ReloadOutcome};
use crate::monitoring::{
    write_status_file, Alert, AlertKind, AlertManager, AlertSeverity, HealthContext, HealthMonitor,
    HealthStatus, ModelView, PnlSummary, StatusSnapshot, TradeAction, TradeLog, TradeRecord,
};
use crate::paths;
use crate::positions::{
    log_report, protective_levels, reconcile, ExitReason, Position, PositionBook, PositionOrigin,
    ReconcileDefaults, ReconcileResult,
};
use crate::risk::{
    check_new_position, compute_position_size, daily_loss_breach, drawdown_breach, DailyPnl,
    KillSwitch, LimitBreach, SizingInput,
};
use crate::symbols::{ControllerSettings, HistorySource, PrefetchedHistory, SymbolController};
use crate::training::{update_queue_file, FinishedJob, JobStatus, ModelTrainer, TrainingScheduler};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::MissedTickBehavior;

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Files the loop maintains; `None` turns that surface off
#[derive(Debug, Clone, Default)]
pub struct OrchestratorFiles {
    pub status: Option<PathBuf>,
    pub training_queue: Option<PathBuf>,
    pub trade_log: Option<PathBuf>,
    pub kill_switch_reset: Option<PathBuf>,
}

impl OrchestratorFiles {
    pub fn standard() -> Self {
        Self {
            status: Some(paths::get_status_file_path()),
            training_queue: Some(paths::get_training_queue_path()),
            trade_log: Some(paths::get_trade_log_path()),
            kill_switch_reset: Some(paths::get_kill_switch_reset_path()),
        }
    }
}

/// Collaborators handed to the loop
pub struct OrchestratorParts {
    pub exchange: Arc<dyn ExchangeClient>,
    pub store: Arc<ModelStore>,
    pub trainer: Arc<dyn ModelTrainer>,
    pub history: Arc<dyn HistorySource>,
    pub signals: Box<dyn SignalEngine>,
    pub files: OrchestratorFiles,
    pub mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub events: u64,
    pub orders_placed: u64,
    pub entries_skipped: u64,
    pub positions_closed: u64,
}

pub struct Orchestrator {
    config: Config,
    exchange: Arc<dyn ExchangeClient>,
    store: Arc<ModelStore>,
    model: Arc<ModelHandle>,
    scheduler: TrainingScheduler,
    controller: SymbolController,
    history: Arc<dyn HistorySource>,
    signals: Box<dyn SignalEngine>,
    guard: PerformanceGuard,
    kill_switch: KillSwitch,
    book: PositionBook,
    daily: DailyPnl,
    candles: CandleBuffer,
    health: HealthMonitor,
    alerts: AlertManager,
    trade_log: Option<TradeLog>,
    files: OrchestratorFiles,
    timers: LoopTimers,
    universe: Vec<String>,
    mode: String,
    started_at: DateTime<Utc>,
    equity: f64,
    last_health: Option<HealthStatus>,
    stats: LoopStats,
}

impl Orchestrator {
    pub fn new(config: Config, parts: OrchestratorParts) -> crate::errors::BotResult<Self> {
        let now = Utc::now();
        let trade_log = match &parts.files.trade_log {
            Some(path) => Some(TradeLog::open(path)?),
            None => None,
        };

        let scheduler = TrainingScheduler::new(
            parts.trainer,
            Arc::clone(&parts.store),
            config.training.max_concurrent_jobs,
            config.training.history_days,
        );

        Ok(Self {
            exchange: parts.exchange,
            model: Arc::new(ModelHandle::new(ModelSnapshot::empty(&config.model.version))),
            store: parts.store,
            scheduler,
            controller: SymbolController::new(ControllerSettings::from_config(
                &config.model,
                &config.training,
            )),
            history: parts.history,
            signals: parts.signals,
            guard: PerformanceGuard::new(config.performance_guard.clone(), 0.0),
            kill_switch: KillSwitch::new(&config.risk),
            book: PositionBook::new(),
            daily: DailyPnl::new(now),
            candles: CandleBuffer::new(config.operations.candle_buffer_size),
            health: HealthMonitor::new(&config.operations),
            alerts: AlertManager::new(config.alerts.clone()),
            trade_log,
            files: parts.files,
            timers: LoopTimers::from_config(&config.positions, &config.operations, now),
            universe: config.exchange.symbols.clone(),
            mode: parts.mode,
            started_at: now,
            equity: 0.0,
            last_health: None,
            stats: LoopStats::default(),
            config,
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn controller(&self) -> &SymbolController {
        &self.controller
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn guard(&self) -> &PerformanceGuard {
        &self.guard
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    pub fn scheduler(&self) -> &TrainingScheduler {
        &self.scheduler
    }

    pub fn current_model(&self) -> Arc<ModelSnapshot> {
        self.model.current()
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    /// Replace the trading universe; records for dropped symbols go on the next evaluation
    pub fn set_universe(&mut self, symbols: Vec<String>) {
        self.universe = symbols;
        self.timers.coverage.trigger_next();
    }

    // =========================================================================
    // LOOP
    // =========================================================================

    /// Run until shutdown is notified
    ///
    /// A closed market feed does not stop the loop; housekeeping keeps running so
    /// training, reconciliation and the status file stay current.
    pub async fn run(mut self, mut events: mpsc::Receiver<MarketEvent>, shutdown: Arc<Notify>) -> LoopStats {
        self.startup().await;

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut feed_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.notified() => {
                    logger::info(LogTag::System, "🛑 Shutdown requested");
                    break;
                }
                event = events.recv(), if feed_open => match event {
                    Some(event) => self.on_market_event(event).await,
                    None => {
                        feed_open = false;
                        logger::info(
                            LogTag::Orchestrator,
                            "Market feed closed, housekeeping continues",
                        );
                    }
                },
                _ = tick.tick() => self.housekeeping(Utc::now()).await,
            }
        }

        self.shutdown().await;
        self.stats.clone()
    }

    /// Equity, full position load and the first symbol evaluation
    pub async fn startup(&mut self) {
        let now = Utc::now();
        logger::info(
            LogTag::System,
            &format!(
                "🚀 Orchestrator starting (mode={}, exchange={}, signals={}, universe={})",
                self.mode,
                self.exchange.name(),
                self.signals.name(),
                self.universe.join(",")
            ),
        );

        self.refresh_equity(now).await;
        self.reconcile_positions("startup", now).await;
        self.refresh_symbol_states(now).await;
        self.write_status(now);

        self.alerts.notify(
            Alert::new(AlertKind::BotStarted, AlertSeverity::Info, "Bot started")
                .with("mode", &self.mode)
                .with("model", self.model.current().version_id())
                .with("positions", self.book.len()),
        );
        self.timers = LoopTimers::from_config(&self.config.positions, &self.config.operations, now);
    }

    /// Fire whichever wall-clock timers are due
    pub async fn housekeeping(&mut self, now: DateTime<Utc>) {
        self.stats.ticks += 1;

        if self.timers.drain.fire(now) {
            self.drain_jobs(now).await;
        }
        if self.timers.coverage.fire(now) {
            self.refresh_symbol_states(now).await;
        }
        // Guard and kill switch see fresh equity every tick
        self.refresh_equity(now).await;
        if self.timers.reconcile.fire(now) {
            self.reconcile_positions("periodic", now).await;
            self.monitor_exits(now).await;
        }
        if self.timers.health.fire(now) {
            self.consume_kill_switch_reset(now);
            self.run_health_check(now);
        }
        if self.timers.heartbeat.fire(now) {
            self.log_heartbeat();
        }
        if self.timers.status.fire(now) {
            self.write_status(now);
        }
    }

    async fn shutdown(&mut self) {
        let now = Utc::now();
        logger::info(
            LogTag::System,
            &format!(
                "Stopping: {} training job(s) running, {} queued",
                self.scheduler.running_count(),
                self.scheduler.queued_count()
            ),
        );

        // In-flight workers finish and publish; nothing new starts
        self.scheduler.halt_new_submissions();
        let finished = self.scheduler.wait_for_running(SHUTDOWN_POLL).await;
        self.apply_finished(finished, now).await;

        let still_queued: Vec<String> = self
            .scheduler
            .job_views()
            .into_iter()
            .filter(|j| j.status == JobStatus::Queued)
            .map(|j| j.symbol)
            .collect();
        if let (Some(path), false) = (&self.files.training_queue, still_queued.is_empty()) {
            if let Err(e) = update_queue_file(path, &still_queued, &[]) {
                logger::warning(
                    LogTag::Training,
                    &format!("Could not persist queued jobs: {}", e),
                );
            }
        }

        if let Some(path) = self.files.status.clone() {
            let snapshot = self.status_snapshot(now, false);
            if let Err(e) = write_status_file(&path, &snapshot) {
                logger::warning(LogTag::Monitor, &format!("Final status write failed: {}", e));
            }
        }

        let pnl = self.pnl_summary(now);
        println!("{}", pnl.render_table());

        self.alerts.notify(
            Alert::new(AlertKind::BotStopped, AlertSeverity::Info, "Bot stopped")
                .with("uptime_secs", (now - self.started_at).num_seconds())
                .with("total_pnl", format!("{:.2}", pnl.total_pnl)),
        );
        logger::info(
            LogTag::System,
            &format!(
                "✅ Orchestrator stopped (events={}, orders={}, closed={})",
                self.stats.events, self.stats.orders_placed, self.stats.positions_closed
            ),
        );
    }

    // =========================================================================
    // SYMBOLS & TRAINING
    // =========================================================================

    /// Reload the model, then evaluate every symbol against the fresh snapshot
    pub async fn refresh_symbol_states(&mut self, now: DateTime<Utc>) {
        let handle = Arc::clone(&self.model);
        let store = Arc::clone(&self.store);
        let reload = tokio::task::spawn_blocking(move || handle.refresh(&store))
            .await
            .unwrap_or_else(|e| Err(BotError::model_load(self.store.metadata_path().as_path(), e)));

        match reload {
            Ok(ReloadOutcome::Swapped {
                from,
                to,
                new_symbols,
            }) => {
                self.alerts.notify(
                    Alert::new(
                        AlertKind::ModelRotation,
                        AlertSeverity::Info,
                        format!("Model revision {} -> {}", from, to),
                    )
                    .with("version", self.model.current().version_id())
                    .with("new_symbols", new_symbols.join(",")),
                );
            }
            Ok(ReloadOutcome::Unchanged { .. }) | Ok(ReloadOutcome::NothingPublished) => {}
            Err(e) => logger::warning(
                LogTag::Models,
                &format!(
                    "Model reload failed, keeping {}: {}",
                    self.model.current().version_id(),
                    e
                ),
            ),
        }

        let snapshot = self.model.current();
        let history = self.prefetch_history(&snapshot).await;
        for symbol in &self.universe {
            self.controller.evaluate_at(
                symbol,
                &snapshot,
                &history,
                &mut self.scheduler,
                now,
            );
        }
        for removed in self.controller.retain_universe(&self.universe) {
            self.candles.remove(&removed);
            self.health.forget_symbol(&removed);
        }

        self.sync_training_queue();
    }

    /// History metrics for the symbols this pass will consult
    async fn prefetch_history(&self, snapshot: &ModelSnapshot) -> PrefetchedHistory {
        let wanted: Vec<String> = self
            .universe
            .iter()
            .filter(|s| self.controller.needs_history(s, snapshot))
            .cloned()
            .collect();
        if wanted.is_empty() {
            return PrefetchedHistory::default();
        }

        let source = Arc::clone(&self.history);
        match tokio::task::spawn_blocking(move || PrefetchedHistory::collect(source.as_ref(), &wanted)).await {
            Ok(history) => history,
            Err(e) => {
                logger::warning(
                    LogTag::Symbols,
                    &format!("History read task failed, untrained symbols blocked this pass: {}", e),
                );
                PrefetchedHistory::default()
            }
        }
    }

    fn sync_training_queue(&self) {
        let Some(path) = &self.files.training_queue else {
            return;
        };
        let awaiting = self.controller.symbols_awaiting_training();
        let active = self.controller.active_symbols();
        if let Err(e) = update_queue_file(path, &awaiting, &active) {
            logger::warning(
                LogTag::Training,
                &format!("Training queue file update failed: {}", e),
            );
        }
    }

    /// Collect finished jobs; returns how many were applied
    pub async fn drain_jobs(&mut self, now: DateTime<Utc>) -> usize {
        let finished = self.scheduler.drain_finished().await;
        self.apply_finished(finished, now).await
    }

    /// Wait for every running job, then apply the results
    pub async fn settle_training(&mut self, now: DateTime<Utc>) -> usize {
        let finished = self.scheduler.wait_for_running(SHUTDOWN_POLL).await;
        self.apply_finished(finished, now).await
    }

    async fn apply_finished(&mut self, finished: Vec<FinishedJob>, now: DateTime<Utc>) -> usize {
        if finished.is_empty() {
            return 0;
        }
        for job in &finished {
            self.controller.on_job_finished_at(job, now);
        }
        self.refresh_symbol_states(now).await;
        finished.len()
    }

    // =========================================================================
    // MARKET EVENTS & ENTRIES
    // =========================================================================

    pub async fn on_market_event(&mut self, event: MarketEvent) {
        let now = Utc::now();
        self.stats.events += 1;

        if !self.universe.iter().any(|s| s == &event.symbol) {
            logger::verbose(
                LogTag::Orchestrator,
                &format!("Ignoring event for {} (not in universe)", event.symbol),
            );
            return;
        }
        let price = event.candle.close;
        if !(price.is_finite() && price > 0.0) {
            logger::warning(
                LogTag::Orchestrator,
                &format!("Ignoring candle for {} with close {}", event.symbol, price),
            );
            return;
        }
        if !self.candles.push(&event.symbol, event.candle.clone()) {
            logger::debug(
                LogTag::Orchestrator,
                &format!("Out-of-order candle for {} dropped", event.symbol),
            );
            return;
        }
        self.health.update_candle(&event.symbol, now);

        // Exits run regardless of guard, kill switch or symbol state
        if self.exit_on_candle(&event.symbol, &event.candle, now).await {
            return;
        }

        let snapshot = self.model.current();
        if !self.controller.is_tradable(&event.symbol, &snapshot) {
            return;
        }
        if self.kill_switch.is_engaged() || !self.guard.can_trade() || self.book.contains(&event.symbol) {
            return;
        }

        let candles = self.candles.candles(&event.symbol);
        let Some(signal) = self.signals.evaluate(&event, candles, &snapshot) else {
            return;
        };

        let threshold = self.config.risk.confidence_threshold + self.guard.confidence_adjustment();
        if signal.confidence < threshold {
            logger::debug(
                LogTag::Orchestrator,
                &format!(
                    "{} {} signal below threshold ({:.3} < {:.3})",
                    event.symbol, signal.side, signal.confidence, threshold
                ),
            );
            self.stats.entries_skipped += 1;
            return;
        }

        self.open_position(&event.symbol, price, &signal, &snapshot, now).await;
    }

    async fn open_position(
        &mut self,
        symbol: &str,
        price: f64,
        signal: &TradeSignal,
        snapshot: &ModelSnapshot,
        now: DateTime<Utc>,
    ) {
        let daily_realized = self.daily.realized_at(now);
        if let Err(breach) = check_new_position(
            symbol,
            &self.book,
            daily_realized,
            self.equity,
            self.guard.drawdown(),
            &self.config.risk,
        ) {
            logger::info(LogTag::Risk, &format!("⛔ {} entry blocked: {}", symbol, breach));
            if let Some(err) = self.kill_switch.check_breach(Some(breach), now) {
                self.on_kill_switch_engaged(err);
            }
            self.stats.entries_skipped += 1;
            return;
        }

        let constraints = match self.exchange.get_instrument_constraints(symbol).await {
            Ok(constraints) => constraints,
            Err(e) => {
                self.record_exchange_error("get_instrument_constraints", e, now);
                return;
            }
        };

        let stop_loss_pct = signal
            .stop_loss_pct
            .unwrap_or(self.config.positions.default_stop_loss_pct);
        let take_profit_pct = signal
            .take_profit_pct
            .unwrap_or(self.config.positions.default_take_profit_pct);
        let input = SizingInput {
            equity: self.equity,
            confidence: signal.confidence,
            price,
            stop_loss_pct,
            guard_multiplier: self.guard.size_multiplier(),
            regime: signal.regime,
        };
        let size = match compute_position_size(&input, &self.config.risk, &constraints) {
            Ok(size) => size,
            Err(rejection) => {
                logger::debug(LogTag::Risk, &format!("{} entry skipped: {}", symbol, rejection));
                self.stats.entries_skipped += 1;
                return;
            }
        };

        let (stop_loss, take_profit) = protective_levels(signal.side, price, stop_loss_pct, take_profit_pct);
        let order = OrderRequest::market(symbol, signal.side, size.quantity)
            .with_protection(stop_loss, take_profit);

        let ack = match self.exchange.place_order(&order).await {
            Ok(ack) => ack,
            Err(e) => {
                self.record_exchange_error("place_order", e, now);
                return;
            }
        };

        let entry_price = ack.average_price.unwrap_or(price);
        let quantity = if ack.filled_quantity > 0.0 {
            ack.filled_quantity
        } else {
            size.quantity
        };
        let position = Position {
            symbol: symbol.to_string(),
            side: signal.side,
            size: quantity,
            entry_price,
            stop_loss,
            take_profit,
            origin: PositionOrigin::OpenedLocally,
            opened_at: now,
        };
        if let Err(e) = self.book.open(position) {
            // Reconciliation picks the venue's view up on the next tick
            logger::error(LogTag::Positions, &format!("Book rejected {}: {}", symbol, e));
        }

        logger::info(
            LogTag::Positions,
            &format!(
                "📈 Opened {} {} {} @ {:.4} (risk {:.2}%, SL {:.4}, TP {:.4}, guard {}, model {})",
                signal.side,
                quantity,
                symbol,
                entry_price,
                size.risk_pct * 100.0,
                stop_loss,
                take_profit,
                self.guard.status(),
                snapshot.version_id()
            ),
        );

        self.stats.orders_placed += 1;
        self.health.update_trade(now);
        self.log_trade(TradeRecord {
            timestamp: now,
            symbol: symbol.to_string(),
            action: TradeAction::Open,
            side: signal.side,
            quantity,
            price: entry_price,
            pnl: None,
            reason: None,
            order_id: ack.order_id,
            model_version: snapshot.version_id(),
        });
    }

    // =========================================================================
    // POSITIONS & EXITS
    // =========================================================================

    /// Bring the book in line with the venue; positions gone from the venue are booked as closed
    pub async fn reconcile_positions(&mut self, label: &str, now: DateTime<Utc>) {
        let positions = match self.exchange.get_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                self.record_exchange_error("get_positions", e, now);
                return;
            }
        };
        let orders = match self.exchange.get_open_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                self.record_exchange_error("get_open_orders", e, now);
                return;
            }
        };

        let defaults = ReconcileDefaults::from(&self.config.positions);
        let ReconcileResult { book, report } = reconcile(&self.book, &positions, &orders, &defaults, now);
        log_report(label, &report);
        self.book = book;

        // A side flip means the old leg was closed on the venue too
        for position in report.removed.into_iter().chain(report.replaced) {
            let exit_price = self
                .candles
                .last_price(&position.symbol)
                .unwrap_or(position.entry_price);
            self.record_closed_trade(&position, exit_price, ExitReason::ClosedOnExchange, None, now);
        }
    }

    /// Close the symbol's position when the candle's range touched a protective level
    ///
    /// Returns true when a position was closed.
    async fn exit_on_candle(&mut self, symbol: &str, candle: &Candle, now: DateTime<Utc>) -> bool {
        let Some((position, reason, level)) = self.book.get(symbol).and_then(|p| {
            p.exit_trigger_in_range(candle.low, candle.high)
                .map(|(reason, level)| (p.clone(), reason, level))
        }) else {
            return false;
        };
        self.close_position(position, level, reason, now).await
    }

    /// Close positions whose stop-loss or take-profit the last price crossed
    ///
    /// Backstop for symbols whose feed went quiet; live candles are checked on arrival.
    pub async fn monitor_exits(&mut self, now: DateTime<Utc>) {
        let exits: Vec<(Position, f64, ExitReason)> = self
            .book
            .iter()
            .filter_map(|p| {
                let price = self.candles.last_price(&p.symbol)?;
                p.exit_trigger(price).map(|reason| (p.clone(), price, reason))
            })
            .collect();

        for (position, price, reason) in exits {
            self.close_position(position, price, reason, now).await;
        }
    }

    /// Reduce-only close; `price` is the fill assumed when the venue reports none
    async fn close_position(
        &mut self,
        position: Position,
        price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> bool {
        let order = OrderRequest::close(&position.symbol, position.side, position.size);
        match self.exchange.place_order(&order).await {
            Ok(ack) => {
                self.book.remove(&position.symbol);
                let exit_price = ack.average_price.unwrap_or(price);
                self.record_closed_trade(&position, exit_price, reason, Some(ack.order_id), now);
                true
            }
            Err(e) => {
                self.record_exchange_error("close position", e, now);
                false
            }
        }
    }

    pub(super) fn record_closed_trade(
        &mut self,
        position: &Position,
        exit_price: f64,
        reason: ExitReason,
        order_id: Option<String>,
        now: DateTime<Utc>,
    ) {
        let pnl = position.unrealized_pnl(exit_price);
        logger::info(
            LogTag::Positions,
            &format!(
                "{} Closed {} {} @ {:.4} ({}) pnl={:+.4}",
                if pnl > 0.0 { "💰" } else { "📉" },
                position.side,
                position.symbol,
                exit_price,
                reason,
                pnl
            ),
        );

        self.daily.record(pnl, now);
        let transition = self.guard.record_trade(TradeOutcome::new(pnl, now));
        self.on_guard_transition(transition);
        self.health.update_trade(now);
        self.stats.positions_closed += 1;

        let model_version = self.model.current().version_id();
        self.log_trade(TradeRecord {
            timestamp: now,
            symbol: position.symbol.clone(),
            action: TradeAction::Close,
            side: position.side,
            quantity: position.size,
            price: exit_price,
            pnl: Some(pnl),
            reason: Some(reason.to_string()),
            order_id: order_id.unwrap_or_default(),
            model_version,
        });

        self.evaluate_kill_switch(now);
    }

    fn log_trade(&mut self, record: TradeRecord) {
        if let Some(log) = self.trade_log.as_mut() {
            if let Err(e) = log.append(&record) {
                logger::warning(LogTag::Monitor, &format!("Trade log append failed: {}", e));
            }
        }
    }

    // =========================================================================
    // RISK
    // =========================================================================

    pub async fn refresh_equity(&mut self, now: DateTime<Utc>) {
        match self.exchange.get_account_equity().await {
            Ok(equity) if equity.is_finite() => {
                self.equity = equity;
                let transition = self.guard.update_equity(equity);
                self.on_guard_transition(transition);
            }
            Ok(equity) => logger::warning(
                LogTag::Exchange,
                &format!("Ignoring non-finite equity {}", equity),
            ),
            Err(e) => self.record_exchange_error("get_account_equity", e, now),
        }
        self.evaluate_kill_switch(now);
    }

    fn current_breach(&mut self, now: DateTime<Utc>) -> Option<LimitBreach> {
        let daily_realized = self.daily.realized_at(now);
        drawdown_breach(self.guard.drawdown(), &self.config.risk)
            .or_else(|| daily_loss_breach(daily_realized, self.equity, &self.config.risk))
    }

    fn evaluate_kill_switch(&mut self, now: DateTime<Utc>) {
        let breach = self.current_breach(now);
        if self.kill_switch.is_engaged() {
            if self.kill_switch.try_clear(self.guard.status(), breach.as_ref(), now) {
                self.on_kill_switch_cleared();
            }
        } else if let Some(err) = self.kill_switch.check_breach(breach, now) {
            self.on_kill_switch_engaged(err);
        }
    }

    fn record_exchange_error(&mut self, operation: &str, err: BotError, now: DateTime<Utc>) {
        logger::warning(LogTag::Exchange, &format!("⚠️ {} failed: {}", operation, err));
        self.health.record_api_error(now);
        if let Some(trip) = self.kill_switch.record_error(&err, now) {
            self.on_kill_switch_engaged(trip);
        }
    }

    fn on_kill_switch_engaged(&mut self, err: BotError) {
        self.scheduler.halt_new_submissions();
        self.alerts.notify(Alert::new(
            AlertKind::KillSwitch,
            AlertSeverity::Critical,
            err.to_string(),
        ));
        self.timers.status.trigger_next();
    }

    fn on_kill_switch_cleared(&mut self) {
        self.scheduler.resume_submissions();
        self.alerts.notify(Alert::new(
            AlertKind::KillSwitch,
            AlertSeverity::Info,
            "Kill switch cleared, trading resumes",
        ));
        self.timers.coverage.trigger_next();
        self.timers.status.trigger_next();
    }

    /// Operator reset through the marker file
    fn consume_kill_switch_reset(&mut self, now: DateTime<Utc>) {
        let Some(path) = &self.files.kill_switch_reset else {
            return;
        };
        if !path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_file(path) {
            logger::warning(
                LogTag::Risk,
                &format!("Could not consume {}: {}", path.display(), e),
            );
            return;
        }

        let was_engaged = self.kill_switch.is_engaged();
        self.kill_switch.reset();
        if was_engaged {
            self.on_kill_switch_cleared();
        }
        // A condition that still holds trips it again right away
        self.evaluate_kill_switch(now);
    }

    fn on_guard_transition(&mut self, transition: Option<GuardTransition>) {
        let Some(transition) = transition else {
            return;
        };
        if transition.to == GuardStatus::Paused {
            self.alerts.notify(
                Alert::new(
                    AlertKind::GuardPaused,
                    AlertSeverity::Warning,
                    format!("Trading paused: {}", transition.reason),
                )
                .with("from", transition.from)
                .with("drawdown", format!("{:.2}%", self.guard.drawdown() * 100.0)),
            );
        }
    }

    // =========================================================================
    // MONITORING
    // =========================================================================

    fn run_health_check(&mut self, now: DateTime<Utc>) {
        let report = self.health.check(
            HealthContext {
                guard: self.guard.status(),
                kill_switch_engaged: self.kill_switch.is_engaged(),
            },
            now,
        );

        let line = format!(
            "Health {:?}: issues=[{}] warnings=[{}]",
            report.status,
            report.issues.join("; "),
            report.warnings.join("; ")
        );
        match report.status {
            HealthStatus::Healthy => logger::debug(LogTag::Monitor, &line),
            HealthStatus::Degraded => logger::warning(LogTag::Monitor, &line),
            HealthStatus::Unhealthy => logger::error(LogTag::Monitor, &line),
        }

        if report.status != HealthStatus::Healthy && self.last_health != Some(report.status) {
            let severity = if report.status == HealthStatus::Unhealthy {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            self.alerts.notify(Alert::new(
                AlertKind::HealthIssue,
                severity,
                report.issues.join("; "),
            ));
        }
        self.last_health = Some(report.status);
    }

    fn log_heartbeat(&self) {
        let states: Vec<String> = self
            .controller
            .summary()
            .iter()
            .map(|(state, count)| format!("{}={}", state, count))
            .collect();
        logger::info(
            LogTag::Orchestrator,
            &format!(
                "💓 model {} | symbols [{}] | guard {} | kill switch {} | positions {} | jobs {}+{} | equity {:.2} | events {}",
                self.model.current().version_id(),
                states.join(" "),
                self.guard.status(),
                if self.kill_switch.is_engaged() { "ENGAGED" } else { "off" },
                self.book.len(),
                self.scheduler.running_count(),
                self.scheduler.queued_count(),
                self.equity,
                self.stats.events
            ),
        );
    }

    pub fn pnl_summary(&mut self, now: DateTime<Utc>) -> PnlSummary {
        match &self.trade_log {
            Some(log) => log.summary().clone(),
            None => PnlSummary {
                daily_pnl: self.daily.realized_at(now),
                ..PnlSummary::default()
            },
        }
    }

    pub fn status_snapshot(&mut self, now: DateTime<Utc>, running: bool) -> StatusSnapshot {
        StatusSnapshot {
            timestamp: now,
            started_at: self.started_at,
            mode: self.mode.clone(),
            running,
            equity: self.equity,
            health: self.health.last_report().cloned(),
            model: ModelView::from(self.model.current().as_ref()),
            symbols: self.controller.records().cloned().collect(),
            guard: self.guard.view(),
            kill_switch: self.kill_switch.view(now),
            positions: self.book.iter().cloned().collect(),
            training_jobs: self.scheduler.job_views(),
            pnl: self.pnl_summary(now),
        }
    }

    fn write_status(&mut self, now: DateTime<Utc>) {
        let Some(path) = self.files.status.clone() else {
            return;
        };
        let snapshot = self.status_snapshot(now, true);
        if let Err(e) = write_status_file(&path, &snapshot) {
            logger::warning(LogTag::Monitor, &format!("Status file write failed: {}", e));
        }
    }
}
