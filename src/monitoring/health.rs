//! Health monitor
//!
//! Tracks data-feed freshness per symbol, the exchange error rate and trading
//! activity. A stalled feed or an error burst makes the bot UNHEALTHY; a paused
//! guard or engaged kill switch makes it DEGRADED. Quiet periods without trades are
//! only warnings.

use crate::config::OperationsConfig;
use crate::guard::GuardStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub api_errors_in_window: usize,
    pub data_feed_ok: bool,
    pub last_trade_hours_ago: Option<f64>,
}

/// Facts the monitor does not track itself
#[derive(Debug, Clone, Copy)]
pub struct HealthContext {
    pub guard: GuardStatus,
    pub kill_switch_engaged: bool,
}

#[derive(Debug, Clone)]
struct Thresholds {
    max_candle_gap: Duration,
    max_api_errors: usize,
    api_error_window: Duration,
    max_no_trade: Duration,
}

pub struct HealthMonitor {
    thresholds: Thresholds,
    last_candle: BTreeMap<String, DateTime<Utc>>,
    last_trade: Option<DateTime<Utc>>,
    api_errors: VecDeque<DateTime<Utc>>,
    last_report: Option<HealthReport>,
}

impl HealthMonitor {
    pub fn new(cfg: &OperationsConfig) -> Self {
        Self {
            thresholds: Thresholds {
                max_candle_gap: Duration::minutes(cfg.max_candle_gap_minutes),
                max_api_errors: cfg.max_api_errors,
                api_error_window: Duration::minutes(cfg.api_error_window_minutes),
                max_no_trade: Duration::hours(cfg.max_no_trade_hours),
            },
            last_candle: BTreeMap::new(),
            last_trade: None,
            api_errors: VecDeque::new(),
            last_report: None,
        }
    }

    /// Record data-feed activity; uses arrival time, not the candle's own timestamp
    pub fn update_candle(&mut self, symbol: &str, received_at: DateTime<Utc>) {
        self.last_candle.insert(symbol.to_string(), received_at);
    }

    pub fn forget_symbol(&mut self, symbol: &str) {
        self.last_candle.remove(symbol);
    }

    pub fn update_trade(&mut self, at: DateTime<Utc>) {
        self.last_trade = Some(at);
    }

    pub fn record_api_error(&mut self, at: DateTime<Utc>) {
        self.api_errors.push_back(at);
    }

    fn api_errors_in_window(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.thresholds.api_error_window;
        while self.api_errors.front().map(|t| *t < cutoff).unwrap_or(false) {
            self.api_errors.pop_front();
        }
        self.api_errors.len()
    }

    pub fn check(&mut self, ctx: HealthContext, now: DateTime<Utc>) -> HealthReport {
        let mut status = HealthStatus::Healthy;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        let mut data_feed_ok = true;
        for (symbol, last) in &self.last_candle {
            let gap = now - *last;
            if gap > self.thresholds.max_candle_gap {
                issues.push(format!("Data feed stalled for {}: {} minutes", symbol, gap.num_minutes()));
                data_feed_ok = false;
            }
        }
        if !data_feed_ok {
            status = HealthStatus::Unhealthy;
        }
        if self.last_candle.is_empty() {
            warnings.push("No candle data received yet".to_string());
        }

        let api_errors = self.api_errors_in_window(now);
        if api_errors >= self.thresholds.max_api_errors {
            issues.push(format!(
                "High API error rate: {} errors in last {} minutes",
                api_errors,
                self.thresholds.api_error_window.num_minutes()
            ));
            status = HealthStatus::Unhealthy;
        }

        if ctx.kill_switch_engaged {
            issues.push("Kill switch engaged".to_string());
            status = status.max(HealthStatus::Degraded);
        }
        if ctx.guard == GuardStatus::Paused {
            issues.push("Performance guard paused trading".to_string());
            status = status.max(HealthStatus::Degraded);
        }

        let last_trade_hours_ago = self
            .last_trade
            .map(|t| (now - t).num_seconds() as f64 / 3600.0);
        match self.last_trade {
            Some(t) if now - t > self.thresholds.max_no_trade => {
                warnings.push(format!(
                    "No trades in {:.1} hours",
                    last_trade_hours_ago.unwrap_or_default()
                ));
            }
            Some(_) => {}
            None => warnings.push("No trades recorded yet".to_string()),
        }

        let report = HealthReport {
            checked_at: now,
            status,
            issues,
            warnings,
            api_errors_in_window: api_errors,
            data_feed_ok,
            last_trade_hours_ago,
        };
        self.last_report = Some(report.clone());
        report
    }

    pub fn last_report(&self) -> Option<&HealthReport> {
        self.last_report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> HealthContext {
        HealthContext {
            guard: GuardStatus::Normal,
            kill_switch_engaged: false,
        }
    }

    #[test]
    fn test_fresh_feed_is_healthy() {
        let mut monitor = HealthMonitor::new(&OperationsConfig::default());
        let now = Utc::now();
        monitor.update_candle("BTCUSDT", now - Duration::minutes(1));
        monitor.update_trade(now - Duration::hours(1));

        let report = monitor.check(ctx(), now);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.issues.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_stalled_feed_is_unhealthy() {
        let mut monitor = HealthMonitor::new(&OperationsConfig::default());
        let now = Utc::now();
        monitor.update_candle("BTCUSDT", now - Duration::minutes(30));
        monitor.update_candle("ETHUSDT", now);

        let report = monitor.check(ctx(), now);
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(!report.data_feed_ok);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_api_error_burst_expires() {
        let mut monitor = HealthMonitor::new(&OperationsConfig::default());
        let now = Utc::now();
        monitor.update_candle("BTCUSDT", now);
        for _ in 0..5 {
            monitor.record_api_error(now);
        }
        assert_eq!(monitor.check(ctx(), now).status, HealthStatus::Unhealthy);

        let later = now + Duration::minutes(11);
        monitor.update_candle("BTCUSDT", later);
        let report = monitor.check(ctx(), later);
        assert_eq!(report.api_errors_in_window, 0);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_guard_pause_and_kill_switch_degrade() {
        let mut monitor = HealthMonitor::new(&OperationsConfig::default());
        let now = Utc::now();
        monitor.update_candle("BTCUSDT", now);
        let report = monitor.check(
            HealthContext {
                guard: GuardStatus::Paused,
                kill_switch_engaged: true,
            },
            now,
        );
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.issues.len(), 2);
    }
}
