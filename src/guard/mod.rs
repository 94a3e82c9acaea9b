//! Performance guard
//!
//! Throttles new risk from recent realized results. `evaluate_guard` is a pure
//! function of the prior status, the trade window and the equity curve;
//! `PerformanceGuard` owns that state for the orchestration loop and re-evaluates
//! whenever a trade closes or equity is pushed.
//!
//! NORMAL ⇄ REDUCED ⇄ PAUSED. Escalation is immediate, de-escalation only passes the
//! recovery hysteresis (`recovery_win_rate`, `recovery_drawdown`,
//! `min_trades_for_recovery`).

pub mod window;

pub use window::{TradeOutcome, TradeWindow};

use crate::config::PerformanceGuardConfig;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardStatus {
    Normal,
    Reduced,
    Paused,
}

impl std::fmt::Display for GuardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardStatus::Normal => write!(f, "NORMAL"),
            GuardStatus::Reduced => write!(f, "REDUCED"),
            GuardStatus::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Peak and current account equity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EquityState {
    pub peak: f64,
    pub current: f64,
}

impl EquityState {
    pub fn new(equity: f64) -> Self {
        Self {
            peak: equity,
            current: equity,
        }
    }

    pub fn update(&mut self, equity: f64) {
        self.current = equity;
        if equity > self.peak {
            self.peak = equity;
        }
    }

    /// (peak - current) / peak, 0 until a positive peak is known
    pub fn drawdown(&self) -> f64 {
        if self.peak <= 0.0 {
            return 0.0;
        }
        ((self.peak - self.current) / self.peak).max(0.0)
    }
}

/// Which thresholds the current inputs breach
#[derive(Debug, Clone, Default, PartialEq)]
struct Breaches {
    pause: Vec<String>,
    reduce: Vec<String>,
    recovered: bool,
}

fn assess(window: &TradeWindow, equity: &EquityState, cfg: &PerformanceGuardConfig) -> Breaches {
    let mut breaches = Breaches::default();
    let drawdown = equity.drawdown();
    let streak = window.losing_streak();
    let evaluable = window.len() >= cfg.min_trades_for_evaluation;
    let win_rate = window.win_rate();

    if let (true, Some(wr)) = (evaluable, win_rate) {
        if wr < cfg.win_rate_threshold_paused {
            breaches.pause.push(format!("win rate {:.0}%", wr * 100.0));
        }
        if wr < cfg.win_rate_threshold_reduced {
            breaches.reduce.push(format!("win rate {:.0}%", wr * 100.0));
        }
    }
    if drawdown >= cfg.drawdown_threshold_paused {
        breaches.pause.push(format!("drawdown {:.1}%", drawdown * 100.0));
    }
    if drawdown >= cfg.drawdown_threshold_reduced {
        breaches.reduce.push(format!("drawdown {:.1}%", drawdown * 100.0));
    }
    if streak >= cfg.losing_streak_paused {
        breaches.pause.push(format!("{} losses in a row", streak));
    }
    if streak >= cfg.losing_streak_reduced {
        breaches.reduce.push(format!("{} losses in a row", streak));
    }

    breaches.recovered = window.len() >= cfg.min_trades_for_recovery
        && win_rate.map(|wr| wr >= cfg.recovery_win_rate).unwrap_or(false)
        && drawdown < cfg.recovery_drawdown;
    breaches
}

/// Next guard status for the given inputs
pub fn evaluate_guard(
    prior: GuardStatus,
    window: &TradeWindow,
    equity: &EquityState,
    cfg: &PerformanceGuardConfig,
) -> GuardStatus {
    evaluate_with_reason(prior, window, equity, cfg).0
}

fn evaluate_with_reason(
    prior: GuardStatus,
    window: &TradeWindow,
    equity: &EquityState,
    cfg: &PerformanceGuardConfig,
) -> (GuardStatus, String) {
    if !cfg.enabled {
        return (GuardStatus::Normal, "guard disabled".to_string());
    }

    let b = assess(window, equity, cfg);
    if !b.pause.is_empty() {
        return (GuardStatus::Paused, b.pause.join(", "));
    }

    match prior {
        GuardStatus::Normal => {
            if b.reduce.is_empty() {
                (GuardStatus::Normal, "within thresholds".to_string())
            } else {
                (GuardStatus::Reduced, b.reduce.join(", "))
            }
        }
        GuardStatus::Reduced | GuardStatus::Paused => {
            if !b.recovered {
                (prior, "recovery conditions not met".to_string())
            } else if !b.reduce.is_empty() {
                (GuardStatus::Reduced, b.reduce.join(", "))
            } else {
                (GuardStatus::Normal, "recovered".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardTransition {
    pub from: GuardStatus,
    pub to: GuardStatus,
    pub reason: String,
}

/// Serializable guard view for the status file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardView {
    pub status: GuardStatus,
    pub status_since: DateTime<Utc>,
    pub trades_in_window: usize,
    pub win_rate: Option<f64>,
    pub losing_streak: usize,
    pub drawdown: f64,
    pub peak_equity: f64,
    pub current_equity: f64,
    pub size_multiplier: f64,
    pub confidence_adjustment: f64,
}

pub struct PerformanceGuard {
    cfg: PerformanceGuardConfig,
    status: GuardStatus,
    window: TradeWindow,
    equity: EquityState,
    status_since: DateTime<Utc>,
}

impl PerformanceGuard {
    pub fn new(cfg: PerformanceGuardConfig, starting_equity: f64) -> Self {
        let window = TradeWindow::new(cfg.window_size);
        Self {
            cfg,
            status: GuardStatus::Normal,
            window,
            equity: EquityState::new(starting_equity),
            status_since: Utc::now(),
        }
    }

    pub fn status(&self) -> GuardStatus {
        self.status
    }

    pub fn window(&self) -> &TradeWindow {
        &self.window
    }

    pub fn equity(&self) -> &EquityState {
        &self.equity
    }

    pub fn drawdown(&self) -> f64 {
        self.equity.drawdown()
    }

    pub fn update_equity(&mut self, equity: f64) -> Option<GuardTransition> {
        self.equity.update(equity);
        self.reevaluate()
    }

    pub fn record_trade(&mut self, outcome: TradeOutcome) -> Option<GuardTransition> {
        logger::debug(
            LogTag::Guard,
            &format!(
                "Trade closed pnl={:.4} win={} (window {}/{})",
                outcome.pnl,
                outcome.is_win,
                self.window.len() + 1,
                self.window.capacity()
            ),
        );
        self.window.push(outcome);
        self.reevaluate()
    }

    fn reevaluate(&mut self) -> Option<GuardTransition> {
        let (next, reason) = evaluate_with_reason(self.status, &self.window, &self.equity, &self.cfg);
        if next == self.status {
            return None;
        }

        let transition = GuardTransition {
            from: self.status,
            to: next,
            reason,
        };
        let message = format!(
            "Guard {} -> {} ({})",
            transition.from, transition.to, transition.reason
        );
        match next {
            GuardStatus::Paused => logger::error(LogTag::Guard, &format!("⛔ {}", message)),
            GuardStatus::Reduced => logger::warning(LogTag::Guard, &format!("⚠️ {}", message)),
            GuardStatus::Normal => logger::info(LogTag::Guard, &format!("✅ {}", message)),
        }

        self.status = next;
        self.status_since = Utc::now();
        Some(transition)
    }

    pub fn can_trade(&self) -> bool {
        self.status != GuardStatus::Paused
    }

    /// Added to the confidence threshold
    pub fn confidence_adjustment(&self) -> f64 {
        match self.status {
            GuardStatus::Reduced => self.cfg.reduced_confidence_adjustment,
            _ => 0.0,
        }
    }

    pub fn size_multiplier(&self) -> f64 {
        match self.status {
            GuardStatus::Normal => 1.0,
            GuardStatus::Reduced => self.cfg.reduced_size_multiplier,
            GuardStatus::Paused => self.cfg.paused_size_multiplier,
        }
    }

    pub fn view(&self) -> GuardView {
        GuardView {
            status: self.status,
            status_since: self.status_since,
            trades_in_window: self.window.len(),
            win_rate: self.window.win_rate(),
            losing_streak: self.window.losing_streak(),
            drawdown: self.equity.drawdown(),
            peak_equity: self.equity.peak,
            current_equity: self.equity.current,
            size_multiplier: self.size_multiplier(),
            confidence_adjustment: self.confidence_adjustment(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_from(pattern: &str, capacity: usize) -> TradeWindow {
        TradeWindow::from_outcomes(
            capacity,
            pattern
                .chars()
                .map(|c| TradeOutcome::new(if c == 'W' { 10.0 } else { -10.0 }, Utc::now())),
        )
    }

    fn cfg() -> PerformanceGuardConfig {
        PerformanceGuardConfig::default()
    }

    #[test]
    fn test_low_win_rate_reduces_size_and_raises_confidence() {
        let mut cfg = cfg();
        cfg.window_size = 20;
        let mut guard = PerformanceGuard::new(cfg, 10_000.0);
        // 7 wins out of 20 = 35%, longest tail streak 1
        for c in "WLLWLLWLLWLLWLLWLLWL".chars() {
            guard.record_trade(TradeOutcome::new(if c == 'W' { 10.0 } else { -5.0 }, Utc::now()));
        }

        assert_eq!(guard.window().win_rate(), Some(0.35));
        assert_eq!(guard.status(), GuardStatus::Reduced);
        assert!(guard.can_trade());
        assert_eq!(guard.size_multiplier(), 0.5);
        assert!((guard.confidence_adjustment() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_pause_escalates_directly_from_normal() {
        let window = window_from("WLLLLLLLLL", 10);
        let equity = EquityState::new(100.0);
        assert_eq!(
            evaluate_guard(GuardStatus::Normal, &window, &equity, &cfg()),
            GuardStatus::Paused
        );
    }

    #[test]
    fn test_drawdown_thresholds() {
        let window = TradeWindow::new(10);
        let mut equity = EquityState::new(100.0);
        equity.update(94.0);
        assert_eq!(evaluate_guard(GuardStatus::Normal, &window, &equity, &cfg()), GuardStatus::Reduced);
        equity.update(90.0);
        assert_eq!(evaluate_guard(GuardStatus::Normal, &window, &equity, &cfg()), GuardStatus::Paused);
    }

    #[test]
    fn test_too_few_trades_do_not_judge_win_rate() {
        let window = window_from("LLL", 10);
        let equity = EquityState::new(100.0);
        assert_eq!(evaluate_guard(GuardStatus::Normal, &window, &equity, &cfg()), GuardStatus::Normal);
    }

    #[test]
    fn test_paused_needs_recovery_not_just_absence_of_breach() {
        // 4/10 = 40%: no reduce breach, but below the 45% recovery bar
        let window = window_from("WLWLWLWLLL", 10);
        let equity = EquityState::new(100.0);
        assert_eq!(evaluate_guard(GuardStatus::Normal, &window, &equity, &cfg()), GuardStatus::Normal);
        assert_eq!(evaluate_guard(GuardStatus::Paused, &window, &equity, &cfg()), GuardStatus::Paused);
        assert_eq!(evaluate_guard(GuardStatus::Reduced, &window, &equity, &cfg()), GuardStatus::Reduced);

        let window = window_from("WLWLWLWLWW", 10);
        assert_eq!(evaluate_guard(GuardStatus::Paused, &window, &equity, &cfg()), GuardStatus::Normal);
    }

    #[test]
    fn test_evaluation_is_deterministic_for_fixed_inputs() {
        let patterns = ["WWWWWWWWWW", "LLLLLLLLLL", "WLLWLLWLLW", "WWLWLWLWLW"];
        let mut equity = EquityState::new(100.0);
        equity.update(97.0);
        for pattern in patterns {
            let window = window_from(pattern, 10);
            let first = evaluate_guard(GuardStatus::Normal, &window, &equity, &cfg());
            for _ in 0..3 {
                assert_eq!(evaluate_guard(GuardStatus::Normal, &window, &equity, &cfg()), first);
            }
            // pause does not depend on the prior status
            if first == GuardStatus::Paused {
                for prior in [GuardStatus::Reduced, GuardStatus::Paused] {
                    assert_eq!(evaluate_guard(prior, &window, &equity, &cfg()), GuardStatus::Paused);
                }
            }
        }
    }

    #[test]
    fn test_disabled_guard_stays_normal() {
        let mut cfg = cfg();
        cfg.enabled = false;
        let mut guard = PerformanceGuard::new(cfg, 100.0);
        guard.update_equity(10.0);
        assert_eq!(guard.status(), GuardStatus::Normal);
        assert_eq!(guard.size_multiplier(), 1.0);
    }

    #[test]
    fn test_transitions_are_reported_once() {
        let mut guard = PerformanceGuard::new(cfg(), 100.0);
        assert!(guard.update_equity(101.0).is_none());
        let transition = guard.update_equity(95.0).unwrap();
        assert_eq!(transition.to, GuardStatus::Reduced);
        assert!(guard.update_equity(95.0).is_none());
        assert!(!guard.view().drawdown.is_nan());
    }
}
