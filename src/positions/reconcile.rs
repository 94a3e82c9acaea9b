//! Position reconciliation
//!
//! `reconcile` is the one merge function used for the startup load and for every
//! periodic refresh. It never mutates its inputs: it returns the next book and a
//! report of what changed.
//!
//! Per symbol:
//! - on the exchange only ⇒ added as LOADED_FROM_EXCHANGE
//! - local only, or exchange size empty/zero/missing ⇒ removed
//! - sides differ ⇒ local record discarded and rebuilt from the exchange
//! - both, same side ⇒ size and entry refreshed from the exchange
//! - exchange fields malformed ⇒ skipped, local record kept as is

use super::book::PositionBook;
use super::types::{protective_levels, Position, PositionOrigin};
use crate::config::PositionsConfig;
use crate::errors::BotError;
use crate::exchange::{parse_decimal, OrderKind, RawOrder, RawPosition, Side};
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileDefaults {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl From<&PositionsConfig> for ReconcileDefaults {
    fn from(cfg: &PositionsConfig) -> Self {
        Self {
            stop_loss_pct: cfg.default_stop_loss_pct,
            take_profit_pct: cfg.default_take_profit_pct,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    /// Local records dropped because the exchange no longer holds them
    pub removed: Vec<Position>,
    pub rebuilt: Vec<String>,
    /// Local records a side mismatch discarded; the old leg is gone from the venue
    pub replaced: Vec<Position>,
    pub refreshed: Vec<String>,
    pub unchanged: Vec<String>,
    /// `DataIntegrity` per skipped symbol
    pub skipped: Vec<BotError>,
    /// `ReconciliationMismatch` per rebuilt symbol
    pub mismatches: Vec<BotError>,
}

impl ReconcileReport {
    /// Nothing was added, removed, rebuilt or refreshed
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.rebuilt.is_empty()
            && self.refreshed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "added={} removed={} rebuilt={} refreshed={} unchanged={} skipped={}",
            self.added.len(),
            self.removed.len(),
            self.rebuilt.len(),
            self.refreshed.len(),
            self.unchanged.len(),
            self.skipped.len()
        )
    }
}

#[derive(Debug)]
pub struct ReconcileResult {
    pub book: PositionBook,
    pub report: ReconcileReport,
}

/// Exchange position after parsing
#[derive(Debug, Clone, Copy, PartialEq)]
struct LivePosition {
    side: Side,
    size: f64,
    entry_price: f64,
}

enum Parsed {
    Flat,
    Live(LivePosition),
    Malformed(String),
}

fn parse_position(raw: &RawPosition) -> Parsed {
    let size = match parse_decimal(raw.size.as_deref()) {
        Ok(Some(size)) => size,
        Ok(None) => return Parsed::Flat,
        Err(e) => return Parsed::Malformed(format!("size {}", e)),
    };
    if size == 0.0 {
        return Parsed::Flat;
    }

    // Some venues report shorts as negative size without a side
    let side = match raw.side.as_deref().and_then(Side::parse) {
        Some(side) => side,
        None if raw.side.as_deref().map(str::trim).unwrap_or("").is_empty() => {
            if size < 0.0 {
                Side::Short
            } else {
                return Parsed::Malformed("side missing".to_string());
            }
        }
        None => {
            return Parsed::Malformed(format!(
                "unknown side '{}'",
                raw.side.as_deref().unwrap_or_default()
            ))
        }
    };

    let entry_price = match parse_decimal(raw.entry_price.as_deref()) {
        Ok(Some(price)) if price > 0.0 => price,
        Ok(Some(price)) => return Parsed::Malformed(format!("entry price {}", price)),
        Ok(None) => return Parsed::Malformed("entry price missing".to_string()),
        Err(e) => return Parsed::Malformed(format!("entry price {}", e)),
    };

    Parsed::Live(LivePosition {
        side,
        size: size.abs(),
        entry_price,
    })
}

/// Trigger price of the first usable resting order of `kind` for `symbol`
fn resting_trigger(orders: &[RawOrder], symbol: &str, kind: OrderKind) -> Option<f64> {
    orders
        .iter()
        .filter(|o| o.symbol == symbol && o.kind == kind)
        .find_map(|o| parse_decimal(o.trigger_price.as_deref()).ok().flatten())
        .filter(|p| *p > 0.0)
}

fn build_from_exchange(
    symbol: &str,
    live: &LivePosition,
    orders: &[RawOrder],
    defaults: &ReconcileDefaults,
    now: DateTime<Utc>,
) -> Position {
    let (default_sl, default_tp) = protective_levels(
        live.side,
        live.entry_price,
        defaults.stop_loss_pct,
        defaults.take_profit_pct,
    );
    Position {
        symbol: symbol.to_string(),
        side: live.side,
        size: live.size,
        entry_price: live.entry_price,
        stop_loss: resting_trigger(orders, symbol, OrderKind::StopLoss).unwrap_or(default_sl),
        take_profit: resting_trigger(orders, symbol, OrderKind::TakeProfit).unwrap_or(default_tp),
        origin: PositionOrigin::LoadedFromExchange,
        opened_at: now,
    }
}

pub fn reconcile(
    local: &PositionBook,
    exchange_positions: &[RawPosition],
    resting_orders: &[RawOrder],
    defaults: &ReconcileDefaults,
    now: DateTime<Utc>,
) -> ReconcileResult {
    let mut report = ReconcileReport::default();
    let mut book = PositionBook::new();

    // Parse the exchange view once; a symbol reported twice with a live size is ambiguous
    let mut live: BTreeMap<String, LivePosition> = BTreeMap::new();
    let mut malformed: BTreeMap<String, String> = BTreeMap::new();
    for raw in exchange_positions {
        let symbol = raw.symbol.trim();
        if symbol.is_empty() {
            continue;
        }
        match parse_position(raw) {
            Parsed::Flat => {}
            Parsed::Live(position) => {
                if live.insert(symbol.to_string(), position).is_some() {
                    malformed.insert(symbol.to_string(), "reported more than once".to_string());
                }
            }
            Parsed::Malformed(reason) => {
                malformed.insert(symbol.to_string(), reason);
            }
        }
    }
    for symbol in malformed.keys() {
        live.remove(symbol);
    }

    let symbols: BTreeSet<String> = local
        .symbols()
        .into_iter()
        .chain(live.keys().cloned())
        .chain(malformed.keys().cloned())
        .collect();

    for symbol in symbols {
        let existing = local.get(&symbol);

        if let Some(reason) = malformed.get(&symbol) {
            report.skipped.push(BotError::integrity(&symbol, reason));
            if let Some(existing) = existing {
                book.upsert(existing.clone());
            }
            continue;
        }

        match (existing, live.get(&symbol)) {
            (None, Some(position)) => {
                book.upsert(build_from_exchange(&symbol, position, resting_orders, defaults, now));
                report.added.push(symbol);
            }
            (Some(existing), None) => {
                report.removed.push(existing.clone());
            }
            (Some(existing), Some(position)) if existing.side != position.side => {
                report.mismatches.push(BotError::ReconciliationMismatch {
                    symbol: symbol.clone(),
                    local: existing.side.to_string(),
                    exchange: position.side.to_string(),
                });
                report.replaced.push(existing.clone());
                book.upsert(build_from_exchange(&symbol, position, resting_orders, defaults, now));
                report.rebuilt.push(symbol);
            }
            (Some(existing), Some(position)) => {
                let mut next = existing.clone();
                next.size = position.size;
                next.entry_price = position.entry_price;
                if let Some(sl) = resting_trigger(resting_orders, &symbol, OrderKind::StopLoss) {
                    next.stop_loss = sl;
                }
                if let Some(tp) = resting_trigger(resting_orders, &symbol, OrderKind::TakeProfit) {
                    next.take_profit = tp;
                }
                if &next == existing {
                    report.unchanged.push(symbol);
                } else {
                    report.refreshed.push(symbol);
                }
                book.upsert(next);
            }
            (None, None) => {}
        }
    }

    ReconcileResult { book, report }
}

/// Log a reconciliation report the same way for startup and periodic runs
pub fn log_report(label: &str, report: &ReconcileReport) {
    for err in &report.mismatches {
        logger::warning(LogTag::Positions, &format!("🔁 {} rebuilt from exchange: {}", label, err));
    }
    for err in &report.skipped {
        logger::warning(LogTag::Positions, &format!("⏭️ {} skipped: {}", label, err));
    }
    for position in &report.removed {
        logger::info(
            LogTag::Positions,
            &format!("➖ {} {} {} no longer on exchange", label, position.symbol, position.side),
        );
    }
    for symbol in &report.added {
        logger::info(LogTag::Positions, &format!("➕ {} loaded {} from exchange", label, symbol));
    }

    if report.is_noop() {
        logger::debug(LogTag::Positions, &format!("{} reconcile: {}", label, report.summary()));
    } else {
        logger::info(LogTag::Positions, &format!("🔄 {} reconcile: {}", label, report.summary()));
    }
}
