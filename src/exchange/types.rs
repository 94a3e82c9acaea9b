//! Exchange boundary types
//!
//! Values coming from the venue keep their raw string form (`RawPosition`,
//! `RawOrder`); numeric parsing happens in reconciliation where an empty or missing
//! field means "absent", never zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Parse venue spellings ("Buy"/"Sell", "long"/"short")
    pub fn parse(raw: &str) -> Option<Side> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Some(Side::Long),
            "sell" | "short" => Some(Side::Short),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Position as reported by the venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    pub symbol: String,
    pub side: Option<String>,
    pub size: Option<String>,
    pub entry_price: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    StopLoss,
    TakeProfit,
}

/// Resting order as reported by the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOrder {
    pub order_id: String,
    pub symbol: String,
    pub kind: OrderKind,
    pub side: Option<String>,
    pub trigger_price: Option<String>,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client id; the venue deduplicates retries on it
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub reduce_only: bool,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl OrderRequest {
    pub fn market(symbol: &str, side: Side, quantity: f64) -> Self {
        Self {
            client_order_id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            quantity,
            reduce_only: false,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn close(symbol: &str, position_side: Side, quantity: f64) -> Self {
        Self {
            reduce_only: true,
            ..Self::market(symbol, position_side.opposite(), quantity)
        }
    }

    pub fn with_protection(mut self, stop_loss: f64, take_profit: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self.take_profit = Some(take_profit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub client_order_id: String,
    pub filled_quantity: f64,
    pub average_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConstraints {
    pub step_size: f64,
    pub min_notional: f64,
}

/// Parse a venue decimal: `Ok(None)` for missing/empty, `Err` for garbage
pub fn parse_decimal(raw: Option<&str>) -> Result<Option<f64>, String> {
    let Some(text) = raw.map(str::trim) else {
        return Ok(None);
    };
    if text.is_empty() {
        return Ok(None);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        Ok(value) => Err(format!("non-finite value {}", value)),
        Err(e) => Err(format!("'{}': {}", text, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_empty_is_absent() {
        assert_eq!(parse_decimal(None), Ok(None));
        assert_eq!(parse_decimal(Some("")), Ok(None));
        assert_eq!(parse_decimal(Some("   ")), Ok(None));
        assert_eq!(parse_decimal(Some("0")), Ok(Some(0.0)));
        assert_eq!(parse_decimal(Some("1.25")), Ok(Some(1.25)));
        assert!(parse_decimal(Some("abc")).is_err());
        assert!(parse_decimal(Some("NaN")).is_err());
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(Side::parse("Buy"), Some(Side::Long));
        assert_eq!(Side::parse("short"), Some(Side::Short));
        assert_eq!(Side::parse(""), None);
        assert_eq!(Side::Long.opposite(), Side::Short);
    }

    #[test]
    fn test_close_order_is_reduce_only_opposite() {
        let order = OrderRequest::close("BTCUSDT", Side::Long, 0.5);
        assert!(order.reduce_only);
        assert_eq!(order.side, Side::Short);
    }
}
