//! Portfolio risk limits checked before every new position

use crate::config::RiskConfig;
use crate::positions::PositionBook;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum LimitBreach {
    MaxOpenPositions { open: usize, max: usize },
    AlreadyOpen(String),
    DailyLoss { pnl: f64, limit: f64 },
    Drawdown { drawdown: f64, limit: f64 },
}

impl std::fmt::Display for LimitBreach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitBreach::MaxOpenPositions { open, max } => {
                write!(f, "max open positions reached ({}/{})", open, max)
            }
            LimitBreach::AlreadyOpen(symbol) => write!(f, "position already open in {}", symbol),
            LimitBreach::DailyLoss { pnl, limit } => {
                write!(f, "daily loss limit exceeded ({:.2} < -{:.2})", pnl, limit)
            }
            LimitBreach::Drawdown { drawdown, limit } => write!(
                f,
                "max drawdown exceeded ({:.2}% > {:.2}%)",
                drawdown * 100.0,
                limit * 100.0
            ),
        }
    }
}

/// Realized PnL for the current UTC day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPnl {
    pub day: NaiveDate,
    pub realized: f64,
    pub trades: usize,
}

impl DailyPnl {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            realized: 0.0,
            trades: 0,
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            *self = Self::new(now);
        }
    }

    pub fn record(&mut self, pnl: f64, now: DateTime<Utc>) {
        self.roll(now);
        self.realized += pnl;
        self.trades += 1;
    }

    /// Realized PnL today (0 after the UTC day changes)
    pub fn realized_at(&mut self, now: DateTime<Utc>) -> f64 {
        self.roll(now);
        self.realized
    }
}

/// Daily loss allowance in quote currency
pub fn daily_loss_limit(equity: f64, cfg: &RiskConfig) -> f64 {
    (equity * cfg.max_daily_loss).abs()
}

pub fn daily_loss_breach(daily_realized: f64, equity: f64, cfg: &RiskConfig) -> Option<LimitBreach> {
    let limit = daily_loss_limit(equity, cfg);
    (daily_realized < -limit).then_some(LimitBreach::DailyLoss {
        pnl: daily_realized,
        limit,
    })
}

pub fn drawdown_breach(drawdown: f64, cfg: &RiskConfig) -> Option<LimitBreach> {
    (drawdown > cfg.max_drawdown).then_some(LimitBreach::Drawdown {
        drawdown,
        limit: cfg.max_drawdown,
    })
}

/// All limits a new position in `symbol` must pass
pub fn check_new_position(
    symbol: &str,
    book: &PositionBook,
    daily_realized: f64,
    equity: f64,
    drawdown: f64,
    cfg: &RiskConfig,
) -> Result<(), LimitBreach> {
    if let Some(breach) = daily_loss_breach(daily_realized, equity, cfg) {
        return Err(breach);
    }
    if let Some(breach) = drawdown_breach(drawdown, cfg) {
        return Err(breach);
    }
    if book.len() >= cfg.max_open_positions {
        return Err(LimitBreach::MaxOpenPositions {
            open: book.len(),
            max: cfg.max_open_positions,
        });
    }
    if book.contains(symbol) {
        return Err(LimitBreach::AlreadyOpen(symbol.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Side;
    use crate::positions::{Position, PositionOrigin};
    use chrono::TimeZone;

    fn position(symbol: &str) -> Position {
        Position {
            symbol: symbol.to_string(),
            side: Side::Long,
            size: 1.0,
            entry_price: 10.0,
            stop_loss: 9.0,
            take_profit: 12.0,
            origin: PositionOrigin::OpenedLocally,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn test_limits_in_order() {
        let cfg = RiskConfig::default();
        let book = PositionBook::from_positions([position("BTCUSDT")]);

        assert!(check_new_position("ETHUSDT", &book, 0.0, 10_000.0, 0.0, &cfg).is_ok());
        assert_eq!(
            check_new_position("BTCUSDT", &book, 0.0, 10_000.0, 0.0, &cfg),
            Err(LimitBreach::AlreadyOpen("BTCUSDT".to_string()))
        );
        assert!(matches!(
            check_new_position("ETHUSDT", &book, -600.0, 10_000.0, 0.0, &cfg),
            Err(LimitBreach::DailyLoss { .. })
        ));
        assert!(matches!(
            check_new_position("ETHUSDT", &book, 0.0, 10_000.0, 0.2, &cfg),
            Err(LimitBreach::Drawdown { .. })
        ));

        let full = PositionBook::from_positions(["A", "B", "C"].map(position));
        assert!(matches!(
            check_new_position("D", &full, 0.0, 10_000.0, 0.0, &cfg),
            Err(LimitBreach::MaxOpenPositions { open: 3, max: 3 })
        ));
    }

    #[test]
    fn test_daily_pnl_rolls_at_utc_midnight() {
        let day1 = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
        let mut daily = DailyPnl::new(day1);
        daily.record(-50.0, day1);
        assert_eq!(daily.realized_at(day1), -50.0);

        let day2 = Utc.with_ymd_and_hms(2024, 3, 2, 0, 30, 0).unwrap();
        assert_eq!(daily.realized_at(day2), 0.0);
        assert_eq!(daily.trades, 0);
    }
}
