//! Kill switch
//!
//! Trips on excessive drawdown, daily loss or error rate. While engaged no new
//! orders and no new training jobs are submitted; work already in flight finishes.
//! It stays latched until the performance guard is back to NORMAL and the
//! triggering condition is gone, or until an operator resets it.

use super::limits::LimitBreach;
use crate::config::RiskConfig;
use crate::errors::BotError;
use crate::guard::GuardStatus;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Errors older than this no longer count towards the budget
pub const ERROR_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripCause {
    Drawdown { drawdown: f64, limit: f64 },
    DailyLoss { pnl: f64, limit: f64 },
    ErrorRate { errors: usize, limit: usize },
}

impl std::fmt::Display for TripCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripCause::Drawdown { drawdown, limit } => write!(
                f,
                "drawdown {:.2}% exceeds {:.2}%",
                drawdown * 100.0,
                limit * 100.0
            ),
            TripCause::DailyLoss { pnl, limit } => {
                write!(f, "daily loss {:.2} exceeds -{:.2}", pnl, limit)
            }
            TripCause::ErrorRate { errors, limit } => write!(
                f,
                "{} errors in {}min (limit {})",
                errors, ERROR_WINDOW_MINUTES, limit
            ),
        }
    }
}

impl TripCause {
    /// Only drawdown and daily loss breaches trip the switch
    pub fn from_breach(breach: LimitBreach) -> Option<Self> {
        match breach {
            LimitBreach::Drawdown { drawdown, limit } => Some(TripCause::Drawdown { drawdown, limit }),
            LimitBreach::DailyLoss { pnl, limit } => Some(TripCause::DailyLoss { pnl, limit }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchView {
    pub engaged: bool,
    pub cause: Option<TripCause>,
    pub engaged_at: Option<DateTime<Utc>>,
    pub recent_errors: usize,
}

pub struct KillSwitch {
    enabled: bool,
    max_errors: usize,
    engaged: Option<(TripCause, DateTime<Utc>)>,
    errors: VecDeque<DateTime<Utc>>,
}

impl KillSwitch {
    pub fn new(cfg: &RiskConfig) -> Self {
        Self {
            enabled: cfg.kill_switch_enabled,
            max_errors: cfg.kill_switch_max_errors,
            engaged: None,
            errors: VecDeque::new(),
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.is_some()
    }

    pub fn cause(&self) -> Option<&TripCause> {
        self.engaged.as_ref().map(|(cause, _)| cause)
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::minutes(ERROR_WINDOW_MINUTES);
        while self.errors.front().map(|t| *t < cutoff).unwrap_or(false) {
            self.errors.pop_front();
        }
    }

    pub fn recent_errors(&mut self, now: DateTime<Utc>) -> usize {
        self.prune(now);
        self.errors.len()
    }

    fn trip(&mut self, cause: TripCause, now: DateTime<Utc>) -> Option<BotError> {
        if !self.enabled || self.engaged.is_some() {
            return None;
        }
        logger::error(LogTag::Risk, &format!("🛑 KILL SWITCH ENGAGED: {}", cause));
        let err = BotError::KillSwitchTriggered {
            reason: cause.to_string(),
        };
        self.engaged = Some((cause, now));
        Some(err)
    }

    /// Count an error; returns the trip error when this one exhausts the budget
    pub fn record_error(&mut self, error: &BotError, now: DateTime<Utc>) -> Option<BotError> {
        if !error.counts_against_error_budget() {
            return None;
        }
        self.errors.push_back(now);
        let errors = self.recent_errors(now);
        if errors >= self.max_errors {
            return self.trip(
                TripCause::ErrorRate {
                    errors,
                    limit: self.max_errors,
                },
                now,
            );
        }
        None
    }

    /// Trip on a drawdown or daily-loss breach
    pub fn check_breach(&mut self, breach: Option<LimitBreach>, now: DateTime<Utc>) -> Option<BotError> {
        let cause = TripCause::from_breach(breach?)?;
        self.trip(cause, now)
    }

    /// Clear when the guard is NORMAL and none of the trip conditions hold any more
    pub fn try_clear(
        &mut self,
        guard: GuardStatus,
        breach: Option<&LimitBreach>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.engaged.is_none() || guard != GuardStatus::Normal {
            return false;
        }
        let drawdown_or_loss = matches!(
            breach,
            Some(LimitBreach::Drawdown { .. }) | Some(LimitBreach::DailyLoss { .. })
        );
        if drawdown_or_loss || self.recent_errors(now) >= self.max_errors {
            return false;
        }
        if let Some((cause, since)) = self.engaged.take() {
            logger::info(
                LogTag::Risk,
                &format!(
                    "✅ Kill switch cleared (was: {}, engaged {}m)",
                    cause,
                    (now - since).num_minutes()
                ),
            );
        }
        true
    }

    /// Operator reset; also forgets counted errors
    pub fn reset(&mut self) {
        if let Some((cause, _)) = self.engaged.take() {
            logger::warning(LogTag::Risk, &format!("🔓 Kill switch manually reset (was: {})", cause));
        }
        self.errors.clear();
    }

    pub fn view(&mut self, now: DateTime<Utc>) -> KillSwitchView {
        KillSwitchView {
            engaged: self.is_engaged(),
            cause: self.cause().cloned(),
            engaged_at: self.engaged.as_ref().map(|(_, at)| *at),
            recent_errors: self.recent_errors(now),
        }
    }
}
