//! Symbol lifecycle state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolState {
    Active,
    QueuedForTraining,
    BlockedUntrained,
    BlockedShortHistory,
    BlockedError,
}

impl SymbolState {
    pub fn is_tradable(&self) -> bool {
        matches!(self, SymbolState::Active)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            SymbolState::BlockedUntrained | SymbolState::BlockedShortHistory | SymbolState::BlockedError
        )
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SymbolState::Active => "🟢",
            SymbolState::QueuedForTraining => "⏳",
            SymbolState::BlockedUntrained => "⚪",
            SymbolState::BlockedShortHistory => "📉",
            SymbolState::BlockedError => "🔴",
        }
    }
}

impl std::fmt::Display for SymbolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SymbolState::Active => "ACTIVE",
            SymbolState::QueuedForTraining => "QUEUED_FOR_TRAINING",
            SymbolState::BlockedUntrained => "BLOCKED_UNTRAINED",
            SymbolState::BlockedShortHistory => "BLOCKED_SHORT_HISTORY",
            SymbolState::BlockedError => "BLOCKED_ERROR",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub symbol: String,
    pub state: SymbolState,
    pub history_coverage_pct: f64,
    pub available_days: u32,
    /// Revision of the snapshot consulted for the last decision
    pub model_revision_seen: u64,
    pub last_error: Option<String>,
    /// Auto-submission is suppressed until this instant
    pub retry_after: Option<DateTime<Utc>>,
    /// Revision published by this symbol's last successful job, until a reload reaches it
    #[serde(default)]
    pub awaiting_revision: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl SymbolRecord {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            state: SymbolState::BlockedUntrained,
            history_coverage_pct: 0.0,
            available_days: 0,
            model_revision_seen: 0,
            last_error: None,
            retry_after: None,
            awaiting_revision: None,
            updated_at: Utc::now(),
        }
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.retry_after.map(|t| now < t).unwrap_or(false)
    }
}
