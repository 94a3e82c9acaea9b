//! Position record

use crate::exchange::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionOrigin {
    OpenedLocally,
    LoadedFromExchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ClosedOnExchange,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::TakeProfit => write!(f, "TAKE_PROFIT"),
            ExitReason::ClosedOnExchange => write!(f, "CLOSED_ON_EXCHANGE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub origin: PositionOrigin,
    pub opened_at: DateTime<Utc>,
}

/// Stop-loss and take-profit at fixed distances from `entry`
pub fn protective_levels(side: Side, entry: f64, stop_loss_pct: f64, take_profit_pct: f64) -> (f64, f64) {
    match side {
        Side::Long => (entry * (1.0 - stop_loss_pct), entry * (1.0 + take_profit_pct)),
        Side::Short => (entry * (1.0 + stop_loss_pct), entry * (1.0 - take_profit_pct)),
    }
}

impl Position {
    pub fn notional(&self) -> f64 {
        self.size * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Which protective level `price` has crossed, if any
    pub fn exit_trigger(&self, price: f64) -> Option<ExitReason> {
        let (hit_stop, hit_target) = match self.side {
            Side::Long => (price <= self.stop_loss, price >= self.take_profit),
            Side::Short => (price >= self.stop_loss, price <= self.take_profit),
        };
        if hit_stop {
            Some(ExitReason::StopLoss)
        } else if hit_target {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    /// Protective level a candle's range touched, with the level it filled at
    ///
    /// The stop wins when one candle spans both levels.
    pub fn exit_trigger_in_range(&self, low: f64, high: f64) -> Option<(ExitReason, f64)> {
        let (hit_stop, hit_target) = match self.side {
            Side::Long => (low <= self.stop_loss, high >= self.take_profit),
            Side::Short => (high >= self.stop_loss, low <= self.take_profit),
        };
        if hit_stop {
            Some((ExitReason::StopLoss, self.stop_loss))
        } else if hit_target {
            Some((ExitReason::TakeProfit, self.take_profit))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: Side) -> Position {
        let (stop_loss, take_profit) = protective_levels(side, 100.0, 0.02, 0.04);
        Position {
            symbol: "BTCUSDT".to_string(),
            side,
            size: 2.0,
            entry_price: 100.0,
            stop_loss,
            take_profit,
            origin: PositionOrigin::OpenedLocally,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn test_long_exit_triggers() {
        let p = position(Side::Long);
        assert_eq!(p.exit_trigger(101.0), None);
        assert_eq!(p.exit_trigger(97.9), Some(ExitReason::StopLoss));
        assert_eq!(p.exit_trigger(104.5), Some(ExitReason::TakeProfit));
        assert!((p.unrealized_pnl(105.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_exit_triggers() {
        let p = position(Side::Short);
        assert_eq!(p.exit_trigger(102.5), Some(ExitReason::StopLoss));
        assert_eq!(p.exit_trigger(95.0), Some(ExitReason::TakeProfit));
        assert!((p.unrealized_pnl(95.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_range_exit_catches_intrabar_crossings() {
        let long = position(Side::Long);
        assert_eq!(long.exit_trigger_in_range(98.5, 103.0), None);
        assert_eq!(
            long.exit_trigger_in_range(97.0, 101.0),
            Some((ExitReason::StopLoss, long.stop_loss))
        );
        assert_eq!(
            long.exit_trigger_in_range(99.0, 104.2),
            Some((ExitReason::TakeProfit, long.take_profit))
        );
        // both touched: stop first
        assert_eq!(
            long.exit_trigger_in_range(97.0, 105.0).map(|(r, _)| r),
            Some(ExitReason::StopLoss)
        );

        let short = position(Side::Short);
        assert_eq!(
            short.exit_trigger_in_range(99.0, 102.5).map(|(r, _)| r),
            Some(ExitReason::StopLoss)
        );
        assert_eq!(
            short.exit_trigger_in_range(95.5, 100.5).map(|(r, _)| r),
            Some(ExitReason::TakeProfit)
        );
    }
}
