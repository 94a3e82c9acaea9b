//! In-memory paper venue
//!
//! Market orders fill immediately at the last price pushed with `set_price`.
//! Protective prices on an entry order become resting STOP_LOSS / TAKE_PROFIT
//! orders; they are reported by `get_open_orders` but never triggered here (the
//! orchestration loop closes positions itself with reduce-only orders).

use super::types::{
    InstrumentConstraints, OrderAck, OrderKind, OrderRequest, RawOrder, RawPosition, Side,
};
use super::ExchangeClient;
use crate::errors::{BotError, BotResult};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy)]
struct PaperPosition {
    side: Side,
    size: f64,
    entry_price: f64,
}

#[derive(Debug, Default)]
struct PaperState {
    /// Starting equity plus realized PnL
    cash: f64,
    positions: BTreeMap<String, PaperPosition>,
    resting: Vec<RawOrder>,
    prices: HashMap<String, f64>,
    acks: HashMap<String, OrderAck>,
    placed: Vec<OrderRequest>,
    next_order_id: u64,
    failures_to_inject: u32,
    raw_positions_override: Option<Vec<RawPosition>>,
}

impl PaperState {
    fn take_injected_failure(&mut self, operation: &str) -> BotResult<()> {
        if self.failures_to_inject > 0 {
            self.failures_to_inject -= 1;
            return Err(BotError::transient(operation, "injected paper failure"));
        }
        Ok(())
    }

    fn next_id(&mut self) -> String {
        self.next_order_id += 1;
        format!("paper-{}", self.next_order_id)
    }
}

pub struct PaperExchange {
    state: Mutex<PaperState>,
    constraints: InstrumentConstraints,
}

impl PaperExchange {
    pub fn new(starting_equity: f64, step_size: f64, min_notional: f64) -> Self {
        Self {
            state: Mutex::new(PaperState {
                cash: starting_equity,
                ..Default::default()
            }),
            constraints: InstrumentConstraints {
                step_size,
                min_notional,
            },
        }
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.state.lock().prices.insert(symbol.to_string(), price);
    }

    /// Fail the next `count` calls with a transient error
    pub fn inject_transient_failures(&self, count: u32) {
        self.state.lock().failures_to_inject = count;
    }

    /// Report these raw positions instead of the simulated book
    pub fn set_raw_positions(&self, positions: Option<Vec<RawPosition>>) {
        self.state.lock().raw_positions_override = positions;
    }

    /// Every accepted order, in submission order
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().placed.clone()
    }

    pub fn realized_cash(&self) -> f64 {
        self.state.lock().cash
    }

    fn fill(state: &mut PaperState, order: &OrderRequest, price: f64) -> BotResult<f64> {
        let existing = state.positions.get(&order.symbol).copied();

        if order.reduce_only {
            let Some(mut position) = existing else {
                return Err(BotError::ExchangeRejected(format!(
                    "reduce-only order for {} without a position",
                    order.symbol
                )));
            };
            if position.side == order.side {
                return Err(BotError::ExchangeRejected(format!(
                    "reduce-only {} order would increase {} {}",
                    order.side, position.side, order.symbol
                )));
            }
            let closed = order.quantity.min(position.size);
            state.cash += (price - position.entry_price) * closed * position.side.sign();
            position.size -= closed;
            if position.size <= f64::EPSILON {
                state.positions.remove(&order.symbol);
                state.resting.retain(|o| o.symbol != order.symbol);
            } else {
                state.positions.insert(order.symbol.clone(), position);
            }
            return Ok(closed);
        }

        let next = match existing {
            None => PaperPosition {
                side: order.side,
                size: order.quantity,
                entry_price: price,
            },
            Some(position) if position.side == order.side => {
                let size = position.size + order.quantity;
                PaperPosition {
                    side: position.side,
                    size,
                    entry_price: (position.entry_price * position.size + price * order.quantity) / size,
                }
            }
            Some(position) => {
                return Err(BotError::ExchangeRejected(format!(
                    "{} {} would flip open {} position",
                    order.side, order.symbol, position.side
                )));
            }
        };
        state.positions.insert(order.symbol.clone(), next);

        let protective = [
            (OrderKind::StopLoss, order.stop_loss),
            (OrderKind::TakeProfit, order.take_profit),
        ];
        for (kind, trigger) in protective {
            if let Some(trigger) = trigger {
                state.resting.retain(|o| !(o.symbol == order.symbol && o.kind == kind));
                let order_id = state.next_id();
                state.resting.push(RawOrder {
                    order_id,
                    symbol: order.symbol.clone(),
                    kind,
                    side: Some(order.side.opposite().to_string()),
                    trigger_price: Some(trigger.to_string()),
                    reduce_only: true,
                });
            }
        }
        Ok(order.quantity)
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    fn name(&self) -> &str {
        "paper"
    }

    async fn get_positions(&self) -> BotResult<Vec<RawPosition>> {
        let mut state = self.state.lock();
        state.take_injected_failure("get_positions")?;
        if let Some(raw) = &state.raw_positions_override {
            return Ok(raw.clone());
        }
        Ok(state
            .positions
            .iter()
            .map(|(symbol, p)| RawPosition {
                symbol: symbol.clone(),
                side: Some(match p.side {
                    Side::Long => "Buy".to_string(),
                    Side::Short => "Sell".to_string(),
                }),
                size: Some(p.size.to_string()),
                entry_price: Some(p.entry_price.to_string()),
            })
            .collect())
    }

    async fn get_open_orders(&self) -> BotResult<Vec<RawOrder>> {
        let mut state = self.state.lock();
        state.take_injected_failure("get_open_orders")?;
        Ok(state.resting.clone())
    }

    async fn get_account_equity(&self) -> BotResult<f64> {
        let mut state = self.state.lock();
        state.take_injected_failure("get_account_equity")?;
        let unrealized: f64 = state
            .positions
            .iter()
            .map(|(symbol, p)| {
                let price = state.prices.get(symbol).copied().unwrap_or(p.entry_price);
                (price - p.entry_price) * p.size * p.side.sign()
            })
            .sum();
        Ok(state.cash + unrealized)
    }

    async fn place_order(&self, order: &OrderRequest) -> BotResult<OrderAck> {
        let mut state = self.state.lock();
        state.take_injected_failure("place_order")?;

        if let Some(ack) = state.acks.get(&order.client_order_id) {
            return Ok(ack.clone());
        }
        if !(order.quantity > 0.0) {
            return Err(BotError::ExchangeRejected(format!(
                "quantity {} for {}",
                order.quantity, order.symbol
            )));
        }
        let price = state.prices.get(&order.symbol).copied().ok_or_else(|| {
            BotError::ExchangeRejected(format!("no market price for {}", order.symbol))
        })?;

        let filled = Self::fill(&mut state, order, price)?;
        let ack = OrderAck {
            order_id: state.next_id(),
            client_order_id: order.client_order_id.clone(),
            filled_quantity: filled,
            average_price: Some(price),
        };
        state.acks.insert(order.client_order_id.clone(), ack.clone());
        state.placed.push(order.clone());

        logger::debug(
            LogTag::Exchange,
            &format!(
                "📝 paper fill {} {} {} @ {} (reduce_only={})",
                order.side, filled, order.symbol, price, order.reduce_only
            ),
        );
        Ok(ack)
    }

    async fn get_instrument_constraints(&self, _symbol: &str) -> BotResult<InstrumentConstraints> {
        self.state.lock().take_injected_failure("get_instrument_constraints")?;
        Ok(self.constraints)
    }
}
