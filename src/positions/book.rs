//! Position book: at most one record per symbol

use super::types::Position;
use crate::errors::{BotError, BotResult};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionBook {
    positions: BTreeMap<String, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: impl IntoIterator<Item = Position>) -> Self {
        let mut book = Self::new();
        for position in positions {
            book.positions.insert(position.symbol.clone(), position);
        }
        book
    }

    /// Record a newly opened position; refuses a second record for the symbol
    pub fn open(&mut self, position: Position) -> BotResult<()> {
        if self.positions.contains_key(&position.symbol) {
            return Err(BotError::ExchangeRejected(format!(
                "position already open for {}",
                position.symbol
            )));
        }
        self.positions.insert(position.symbol.clone(), position);
        Ok(())
    }

    pub(crate) fn upsert(&mut self, position: Position) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn remove(&mut self, symbol: &str) -> Option<Position> {
        self.positions.remove(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn total_notional(&self) -> f64 {
        self.positions.values().map(Position::notional).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Side;
    use crate::positions::types::PositionOrigin;
    use chrono::Utc;

    fn position(symbol: &str) -> Position {
        Position {
            symbol: symbol.to_string(),
            side: Side::Long,
            size: 1.0,
            entry_price: 50.0,
            stop_loss: 49.0,
            take_profit: 52.0,
            origin: PositionOrigin::OpenedLocally,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn test_one_record_per_symbol() {
        let mut book = PositionBook::new();
        book.open(position("BTCUSDT")).unwrap();
        assert!(book.open(position("BTCUSDT")).is_err());
        book.open(position("ETHUSDT")).unwrap();
        assert_eq!(book.len(), 2);
        assert!((book.total_notional() - 100.0).abs() < 1e-9);
        assert!(book.remove("BTCUSDT").is_some());
        assert!(!book.contains("BTCUSDT"));
    }
}
