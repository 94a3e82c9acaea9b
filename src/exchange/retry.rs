//! Retry wrapper for transient exchange failures
//!
//! Only `BotError::TransientIo` is retried. Delay for attempt n (1-based) is
//! `min(base * 2^(n-1), max)` plus up to 25% random jitter. Orders carry a client id
//! so a retried submission is deduplicated by the venue.

use super::types::{InstrumentConstraints, OrderAck, OrderRequest, RawOrder, RawPosition};
use super::ExchangeClient;
use crate::config::ExchangeConfig;
use crate::errors::BotResult;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ExchangeConfig) -> Self {
        Self {
            max_attempts: cfg.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.retry_base_delay_ms),
            max_delay: Duration::from_millis(cfg.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1 = first retry), without jitter
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        let jitter_range = delay.as_millis() as u64 / 4;
        if jitter_range == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_range))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExchangeConfig::default())
    }
}

pub struct RetryingExchange {
    inner: Arc<dyn ExchangeClient>,
    policy: RetryPolicy,
    retries: AtomicU64,
}

impl RetryingExchange {
    pub fn new(inner: Arc<dyn ExchangeClient>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            retries: AtomicU64::new(0),
        }
    }

    /// Total retries performed since creation
    pub fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, call: F) -> BotResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BotResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_with_jitter(attempt);
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    logger::warning(
                        LogTag::Exchange,
                        &format!(
                            "🔁 {} {} failed (attempt {}/{}), retrying in {}ms: {}",
                            self.inner.name(),
                            operation,
                            attempt,
                            self.policy.max_attempts,
                            delay.as_millis(),
                            e
                        ),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        logger::error(
                            LogTag::Exchange,
                            &format!(
                                "❌ {} {} gave up after {} attempts: {}",
                                self.inner.name(),
                                operation,
                                attempt,
                                e
                            ),
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl ExchangeClient for RetryingExchange {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_positions(&self) -> BotResult<Vec<RawPosition>> {
        self.with_retry("get_positions", || self.inner.get_positions()).await
    }

    async fn get_open_orders(&self) -> BotResult<Vec<RawOrder>> {
        self.with_retry("get_open_orders", || self.inner.get_open_orders()).await
    }

    async fn get_account_equity(&self) -> BotResult<f64> {
        self.with_retry("get_account_equity", || self.inner.get_account_equity()).await
    }

    async fn place_order(&self, order: &OrderRequest) -> BotResult<OrderAck> {
        self.with_retry("place_order", || self.inner.place_order(order)).await
    }

    async fn get_instrument_constraints(&self, symbol: &str) -> BotResult<InstrumentConstraints> {
        self.with_retry("get_instrument_constraints", || {
            self.inner.get_instrument_constraints(symbol)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BotError;
    use crate::exchange::{PaperExchange, Side};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(4_000),
        };
        assert_eq!(policy.base_delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.base_delay_for(3), Duration::from_millis(1_000));
        assert_eq!(policy.base_delay_for(9), Duration::from_millis(4_000));
        let jittered = policy.delay_with_jitter(2);
        assert!(jittered >= Duration::from_millis(500) && jittered <= Duration::from_millis(625));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let paper = Arc::new(PaperExchange::new(1_000.0, 0.001, 5.0));
        paper.inject_transient_failures(2);
        let exchange = RetryingExchange::new(paper.clone(), fast_policy(3));

        assert_eq!(exchange.get_account_equity().await.unwrap(), 1_000.0);
        assert_eq!(exchange.retry_count(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let paper = Arc::new(PaperExchange::new(1_000.0, 0.001, 5.0));
        paper.inject_transient_failures(5);
        let exchange = RetryingExchange::new(paper, fast_policy(3));

        let err = exchange.get_positions().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(exchange.retry_count(), 2);
    }

    #[tokio::test]
    async fn test_rejections_are_not_retried() {
        let paper = Arc::new(PaperExchange::new(1_000.0, 0.001, 5.0));
        let exchange = RetryingExchange::new(paper, fast_policy(3));

        // no price set for the symbol
        let err = exchange
            .place_order(&OrderRequest::market("BTCUSDT", Side::Long, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::ExchangeRejected(_)));
        assert_eq!(exchange.retry_count(), 0);
    }
}
