/// Configuration schemas - all config structures defined once with defaults
///
/// Each struct is defined using the config_struct! macro which provides:
/// - Single-source definition (no repetition)
/// - Embedded defaults
/// - Serde support (missing keys fall back to the defaults below)
///
/// Every numeric threshold the bot uses lives here; none are hidden in code.
use crate::config_struct;

// ============================================================================
// PATHS CONFIGURATION
// ============================================================================

config_struct! {
    /// Filesystem layout overrides
    pub struct PathsConfig {
        /// Base directory for data/models/logs (empty = platform default)
        base_dir: String = String::new(),
    }
}

// ============================================================================
// EXCHANGE CONFIGURATION
// ============================================================================

config_struct! {
    /// Exchange boundary configuration
    pub struct ExchangeConfig {
        /// Trading universe
        symbols: Vec<String> = vec![
            "BTCUSDT".to_string(),
            "ETHUSDT".to_string(),
            "SOLUSDT".to_string(),
        ],
        testnet: bool = true,

        // Paper venue
        paper_starting_equity: f64 = 10_000.0,
        paper_step_size: f64 = 0.001,
        paper_min_notional: f64 = 5.0,

        // Retry policy for transient failures
        retry_max_attempts: u32 = 3,
        retry_base_delay_ms: u64 = 250,
        retry_max_delay_ms: u64 = 4_000,
    }
}

// ============================================================================
// MODEL CONFIGURATION
// ============================================================================

config_struct! {
    /// Model store and symbol lifecycle configuration
    pub struct ModelConfig {
        /// Version label used to name artifacts
        version: String = "1.0".to_string(),
        auto_train_new_symbols: bool = true,
        min_history_days_to_train: u32 = 90,
        /// Fraction in [0, 1]
        min_history_coverage_pct: f64 = 0.95,

        // Publish lock
        lock_max_attempts: u32 = 10,
        lock_retry_interval_ms: u64 = 500,
        lock_stale_secs: u64 = 600,

        /// Artifact revisions kept on disk
        keep_revisions: usize = 3,
    }
}

// ============================================================================
// TRAINING CONFIGURATION
// ============================================================================

config_struct! {
    /// Background training scheduler configuration
    pub struct TrainingConfig {
        /// External trainer program (empty = training unavailable)
        trainer_command: String = String::new(),
        trainer_args: Vec<String> = Vec::new(),
        max_concurrent_jobs: usize = 2,
        /// Cool-down after a failed job before the symbol may be queued again
        retry_cooldown_secs: u64 = 3_600,
        /// History window requested from the trainer
        history_days: u32 = 730,
    }
}

// ============================================================================
// PERFORMANCE GUARD CONFIGURATION
// ============================================================================

config_struct! {
    /// Performance guard thresholds
    pub struct PerformanceGuardConfig {
        enabled: bool = true,
        window_size: usize = 10,
        min_trades_for_evaluation: usize = 5,
        min_trades_for_recovery: usize = 5,

        // REDUCED
        win_rate_threshold_reduced: f64 = 0.40,
        drawdown_threshold_reduced: f64 = 0.05,
        losing_streak_reduced: usize = 5,

        // PAUSED
        win_rate_threshold_paused: f64 = 0.30,
        drawdown_threshold_paused: f64 = 0.10,
        losing_streak_paused: usize = 10,

        // Recovery hysteresis
        recovery_win_rate: f64 = 0.45,
        recovery_drawdown: f64 = 0.05,

        // Effects
        reduced_size_multiplier: f64 = 0.5,
        paused_size_multiplier: f64 = 0.0,
        reduced_confidence_adjustment: f64 = 0.1,
    }
}

// ============================================================================
// RISK CONFIGURATION
// ============================================================================

config_struct! {
    /// Sizing, limits and kill switch
    pub struct RiskConfig {
        // Risk-targeted sizing
        risk_pct_min: f64 = 0.009,
        risk_pct_max: f64 = 0.02,
        confidence_floor: f64 = 0.6,
        confidence_ceiling: f64 = 0.9,
        /// Minimum model confidence before any order is considered
        confidence_threshold: f64 = 0.6,
        max_leverage: f64 = 3.0,

        // Regime multipliers
        regime_multiplier_trending: f64 = 1.0,
        regime_multiplier_ranging: f64 = 0.75,
        regime_multiplier_high_volatility: f64 = 0.5,

        // Limits
        max_open_positions: usize = 3,
        /// Fraction of day-start equity
        max_daily_loss: f64 = 0.05,
        /// Fraction of peak equity
        max_drawdown: f64 = 0.15,

        // Kill switch
        kill_switch_enabled: bool = true,
        kill_switch_max_errors: usize = 20,
    }
}

// ============================================================================
// POSITIONS CONFIGURATION
// ============================================================================

config_struct! {
    /// Position defaults and reconciliation cadence
    pub struct PositionsConfig {
        default_stop_loss_pct: f64 = 0.02,
        default_take_profit_pct: f64 = 0.04,
        reconcile_interval_secs: u64 = 300,
    }
}

// ============================================================================
// OPERATIONS CONFIGURATION
// ============================================================================

config_struct! {
    /// Loop timers and health thresholds
    pub struct OperationsConfig {
        coverage_check_interval_secs: u64 = 300,
        job_drain_interval_secs: u64 = 5,
        heartbeat_interval_secs: u64 = 60,
        health_check_interval_secs: u64 = 300,
        status_file_interval_secs: u64 = 60,

        // Health thresholds
        max_candle_gap_minutes: i64 = 15,
        max_api_errors: usize = 5,
        api_error_window_minutes: i64 = 10,
        max_no_trade_hours: i64 = 168,

        /// Candles kept per symbol for the signal engine
        candle_buffer_size: usize = 500,

        // Paper replay feed
        replay_candles: usize = 200,
        replay_pace_ms: u64 = 250,
    }
}

// ============================================================================
// ALERTS CONFIGURATION
// ============================================================================

config_struct! {
    /// Alert delivery
    pub struct AlertsConfig {
        enabled: bool = false,
        /// JSON webhook endpoint (Discord-compatible payload)
        webhook_url: String = String::new(),
        timeout_secs: u64 = 10,
        alert_on_pause: bool = true,
        alert_on_kill_switch: bool = true,
        alert_on_model_rotation: bool = true,
        alert_on_health_issues: bool = true,
    }
}

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration (data/config.toml)
    pub struct Config {
        paths: PathsConfig = PathsConfig::default(),
        exchange: ExchangeConfig = ExchangeConfig::default(),
        model: ModelConfig = ModelConfig::default(),
        training: TrainingConfig = TrainingConfig::default(),
        performance_guard: PerformanceGuardConfig = PerformanceGuardConfig::default(),
        risk: RiskConfig = RiskConfig::default(),
        positions: PositionsConfig = PositionsConfig::default(),
        operations: OperationsConfig = OperationsConfig::default(),
        alerts: AlertsConfig = AlertsConfig::default(),
    }
}

// ============================================================================
// IMPLEMENTATIONS
// ============================================================================

impl Config {
    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.model.version.trim().is_empty() {
            return Err("model.version cannot be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.model.min_history_coverage_pct) {
            return Err("model.min_history_coverage_pct must be within [0, 1]".to_string());
        }
        if self.model.lock_max_attempts == 0 {
            return Err("model.lock_max_attempts must be > 0".to_string());
        }
        if self.risk.risk_pct_min > self.risk.risk_pct_max {
            return Err("risk.risk_pct_min cannot exceed risk.risk_pct_max".to_string());
        }
        if self.risk.confidence_floor >= self.risk.confidence_ceiling {
            return Err("risk.confidence_floor must be below risk.confidence_ceiling".to_string());
        }
        if self.positions.default_stop_loss_pct <= 0.0 {
            return Err("positions.default_stop_loss_pct must be > 0".to_string());
        }

        let guard = &self.performance_guard;
        if guard.window_size == 0 {
            return Err("performance_guard.window_size must be > 0".to_string());
        }
        if guard.win_rate_threshold_paused > guard.win_rate_threshold_reduced {
            return Err(
                "performance_guard paused win rate must not exceed the reduced one".to_string(),
            );
        }
        if guard.drawdown_threshold_paused < guard.drawdown_threshold_reduced {
            return Err(
                "performance_guard paused drawdown must not be below the reduced one".to_string(),
            );
        }

        Ok(())
    }
}
