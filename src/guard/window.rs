//! Rolling window of closed trades

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub pnl: f64,
    pub is_win: bool,
    pub closed_at: DateTime<Utc>,
}

impl TradeOutcome {
    pub fn new(pnl: f64, closed_at: DateTime<Utc>) -> Self {
        Self {
            pnl,
            is_win: pnl > 0.0,
            closed_at,
        }
    }
}

/// Fixed-capacity ring; the oldest outcome is evicted first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeWindow {
    capacity: usize,
    trades: VecDeque<TradeOutcome>,
}

impl TradeWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            trades: VecDeque::with_capacity(capacity),
        }
    }

    pub fn from_outcomes(capacity: usize, outcomes: impl IntoIterator<Item = TradeOutcome>) -> Self {
        let mut window = Self::new(capacity);
        for outcome in outcomes {
            window.push(outcome);
        }
        window
    }

    pub fn push(&mut self, outcome: TradeOutcome) {
        if self.trades.len() == self.capacity {
            self.trades.pop_front();
        }
        self.trades.push_back(outcome);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn wins(&self) -> usize {
        self.trades.iter().filter(|t| t.is_win).count()
    }

    /// None while the window is empty
    pub fn win_rate(&self) -> Option<f64> {
        if self.trades.is_empty() {
            None
        } else {
            Some(self.wins() as f64 / self.trades.len() as f64)
        }
    }

    /// Consecutive losses ending at the newest trade
    pub fn losing_streak(&self) -> usize {
        self.trades.iter().rev().take_while(|t| !t.is_win).count()
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TradeOutcome> {
        self.trades.iter()
    }
}
