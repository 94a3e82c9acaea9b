//! Exchange boundary
//!
//! The orchestration loop only talks to `ExchangeClient`. Wire formats stay behind
//! it; numeric fields come back as strings so that reconciliation decides what an
//! empty value means.
//!
//! - `types`: boundary records and decimal parsing
//! - `retry`: transient-failure retry with capped exponential backoff and jitter
//! - `paper`: in-memory venue used for paper trading and tests

pub mod paper;
pub mod retry;
pub mod types;

pub use paper::PaperExchange;
pub use retry::{RetryPolicy, RetryingExchange};
pub use types::{
    parse_decimal, Candle, InstrumentConstraints, OrderAck, OrderKind, OrderRequest, RawOrder,
    RawPosition, Side,
};

use crate::errors::BotResult;
use async_trait::async_trait;

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn name(&self) -> &str;

    async fn get_positions(&self) -> BotResult<Vec<RawPosition>>;

    /// Resting stop-loss / take-profit orders
    async fn get_open_orders(&self) -> BotResult<Vec<RawOrder>>;

    async fn get_account_equity(&self) -> BotResult<f64>;

    async fn place_order(&self, order: &OrderRequest) -> BotResult<OrderAck>;

    async fn get_instrument_constraints(&self, symbol: &str) -> BotResult<InstrumentConstraints>;
}
