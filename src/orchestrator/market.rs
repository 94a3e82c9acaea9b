//! Market events, signal seam and candle buffers
//!
//! Signal math lives outside the crate. A feed delivers `MarketEvent`s over an mpsc
//! channel; the `SignalEngine` turns the buffered candles (and whatever the feed
//! attached) into an optional `TradeSignal`. `CsvReplayFeed` replays stored hourly
//! candles for paper runs.

use crate::exchange::{Candle, PaperExchange, Side};
use crate::logger::{self, LogTag};
use crate::models::ModelSnapshot;
use crate::risk::MarketRegime;
use crate::symbols::CandleCsvHistory;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

#[derive(Debug, Clone, PartialEq)]
pub struct TradeSignal {
    pub side: Side,
    /// Model probability in [0, 1]
    pub confidence: f64,
    pub regime: MarketRegime,
    /// Overrides for the configured protective distances
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
}

impl TradeSignal {
    pub fn new(side: Side, confidence: f64) -> Self {
        Self {
            side,
            confidence,
            regime: MarketRegime::Trending,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }

    pub fn with_regime(mut self, regime: MarketRegime) -> Self {
        self.regime = regime;
        self
    }

    pub fn with_stops(mut self, stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        self.stop_loss_pct = Some(stop_loss_pct);
        self.take_profit_pct = Some(take_profit_pct);
        self
    }

    fn is_usable(&self) -> bool {
        let pct_ok = |p: Option<f64>| p.map(|v| v.is_finite() && v > 0.0).unwrap_or(true);
        self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
            && pct_ok(self.stop_loss_pct)
            && pct_ok(self.take_profit_pct)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketEvent {
    pub symbol: String,
    pub candle: Candle,
    pub signal: Option<TradeSignal>,
}

impl MarketEvent {
    pub fn candle(symbol: &str, candle: Candle) -> Self {
        Self {
            symbol: symbol.to_string(),
            candle,
            signal: None,
        }
    }

    pub fn with_signal(mut self, signal: TradeSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

pub trait SignalEngine: Send {
    fn name(&self) -> &str;

    /// Signal for `event.symbol` given its buffered candles and the model snapshot the
    /// loop consulted for this event
    fn evaluate(
        &self,
        event: &MarketEvent,
        candles: &[Candle],
        snapshot: &ModelSnapshot,
    ) -> Option<TradeSignal>;
}

/// Passes through the signal the feed attached to the event
#[derive(Debug, Default, Clone, Copy)]
pub struct AttachedSignals;

impl SignalEngine for AttachedSignals {
    fn name(&self) -> &str {
        "attached"
    }

    fn evaluate(
        &self,
        event: &MarketEvent,
        _candles: &[Candle],
        snapshot: &ModelSnapshot,
    ) -> Option<TradeSignal> {
        let signal = event.signal.as_ref()?;
        if !signal.is_usable() {
            logger::warning(
                LogTag::Orchestrator,
                &format!("Discarding malformed signal for {}: {:?}", event.symbol, signal),
            );
            return None;
        }
        if snapshot.encoding_index(&event.symbol).is_none() {
            logger::debug(
                LogTag::Orchestrator,
                &format!(
                    "{} has no encoding in {}, ignoring signal",
                    event.symbol,
                    snapshot.version_id()
                ),
            );
            return None;
        }
        Some(signal.clone())
    }
}

/// Per-symbol rolling candle buffers
#[derive(Debug)]
pub struct CandleBuffer {
    capacity: usize,
    buffers: HashMap<String, VecDeque<Candle>>,
}

impl CandleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: HashMap::new(),
        }
    }

    /// Append a candle; a repeated timestamp replaces the last bar, an older one is dropped
    pub fn push(&mut self, symbol: &str, candle: Candle) -> bool {
        let buffer = self.buffers.entry(symbol.to_string()).or_default();
        if let Some(last) = buffer.back_mut() {
            if candle.timestamp < last.timestamp {
                return false;
            }
            if candle.timestamp == last.timestamp {
                *last = candle;
                return true;
            }
        }
        buffer.push_back(candle);
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
        true
    }

    pub fn candles(&mut self, symbol: &str) -> &[Candle] {
        match self.buffers.get_mut(symbol) {
            Some(buffer) => buffer.make_contiguous(),
            None => &[],
        }
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.buffers.get(symbol).map(VecDeque::len).unwrap_or(0)
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.buffers.get(symbol)?.back().map(|c| c.close)
    }

    pub fn remove(&mut self, symbol: &str) {
        self.buffers.remove(symbol);
    }
}

/// Replays stored candles as market events, oldest first across symbols
pub struct CsvReplayFeed {
    history: CandleCsvHistory,
    symbols: Vec<String>,
    /// Candles per symbol, taken from the end of each file
    limit: usize,
    pace: Duration,
    paper: Option<Arc<PaperExchange>>,
}

impl CsvReplayFeed {
    pub fn new(history: CandleCsvHistory, symbols: Vec<String>, limit: usize, pace: Duration) -> Self {
        Self {
            history,
            symbols,
            limit,
            pace,
            paper: None,
        }
    }

    /// Push each replayed close into the paper venue before the event is sent
    pub fn with_paper_prices(mut self, paper: Arc<PaperExchange>) -> Self {
        self.paper = Some(paper);
        self
    }

    fn load_events(&self) -> Vec<MarketEvent> {
        let mut events = Vec::new();
        for symbol in &self.symbols {
            match self.history.read_candles(symbol) {
                Ok(candles) => {
                    let skip = candles.len().saturating_sub(self.limit);
                    events.extend(
                        candles
                            .into_iter()
                            .skip(skip)
                            .map(|c| MarketEvent::candle(symbol, c)),
                    );
                }
                Err(e) => logger::warning(
                    LogTag::Orchestrator,
                    &format!("Replay skips {}: {}", symbol, e),
                ),
            }
        }
        events.sort_by(|a, b| {
            a.candle
                .timestamp
                .cmp(&b.candle.timestamp)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        events
    }

    /// Send every event, stopping early on shutdown or when the loop hangs up
    pub async fn run(self, sink: mpsc::Sender<MarketEvent>, shutdown: Arc<Notify>) -> usize {
        let events = self.load_events();
        logger::info(
            LogTag::Orchestrator,
            &format!(
                "▶️ Replaying {} candles for {} symbols",
                events.len(),
                self.symbols.len()
            ),
        );

        let mut sent = 0;
        for event in events {
            if let Some(paper) = &self.paper {
                paper.set_price(&event.symbol, event.candle.close);
            }
            tokio::select! {
                _ = shutdown.notified() => {
                    // Hand the permit back so the loop still sees the shutdown
                    shutdown.notify_one();
                    break;
                }
                result = sink.send(event) => {
                    if result.is_err() {
                        break;
                    }
                    sent += 1;
                }
            }
            if !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
        }

        logger::info(LogTag::Orchestrator, &format!("⏹️ Replay finished ({} events)", sent));
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelMetadata;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn candle(hour: i64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + ChronoDuration::hours(hour),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn snapshot_with(symbol: &str) -> ModelSnapshot {
        let mut metadata = ModelMetadata::empty("1.0");
        metadata.revision = 1;
        metadata.trained_symbols.insert(symbol.to_string());
        metadata.symbol_encoding_map.insert(symbol.to_string(), 0);
        ModelSnapshot::new(metadata, Vec::new(), Vec::new())
    }

    #[test]
    fn test_candle_buffer_caps_and_replaces() {
        let mut buffer = CandleBuffer::new(3);
        for hour in 0..5 {
            assert!(buffer.push("BTCUSDT", candle(hour, 100.0 + hour as f64)));
        }
        assert_eq!(buffer.len("BTCUSDT"), 3);
        assert_eq!(buffer.candles("BTCUSDT")[0].close, 102.0);

        // Same bar updated in place, older bar dropped
        assert!(buffer.push("BTCUSDT", candle(4, 110.0)));
        assert!(!buffer.push("BTCUSDT", candle(1, 50.0)));
        assert_eq!(buffer.len("BTCUSDT"), 3);
        assert_eq!(buffer.last_price("BTCUSDT"), Some(110.0));
        assert!(buffer.candles("ETHUSDT").is_empty());
    }

    #[test]
    fn test_attached_signals_filters_malformed() {
        let engine = AttachedSignals;
        let snapshot = snapshot_with("BTCUSDT");

        let good = MarketEvent::candle("BTCUSDT", candle(0, 100.0))
            .with_signal(TradeSignal::new(Side::Long, 0.8));
        assert_eq!(
            engine.evaluate(&good, &[], &snapshot).map(|s| s.side),
            Some(Side::Long)
        );

        let bad = MarketEvent::candle("BTCUSDT", candle(0, 100.0))
            .with_signal(TradeSignal::new(Side::Long, f64::NAN));
        assert!(engine.evaluate(&bad, &[], &snapshot).is_none());

        let unknown = MarketEvent::candle("XRPUSDT", candle(0, 1.0))
            .with_signal(TradeSignal::new(Side::Short, 0.9));
        assert!(engine.evaluate(&unknown, &[], &snapshot).is_none());

        let bare = MarketEvent::candle("BTCUSDT", candle(0, 100.0));
        assert!(engine.evaluate(&bare, &[], &snapshot).is_none());
    }

    #[tokio::test]
    async fn test_replay_interleaves_symbols_and_sets_paper_prices() {
        let dir = tempfile::tempdir().unwrap();
        let write = |symbol: &str, closes: &[f64]| {
            let mut rows = String::from("timestamp,open,high,low,close,volume\n");
            for (hour, close) in closes.iter().enumerate() {
                let ts = candle(hour as i64, *close).timestamp.timestamp_millis();
                rows.push_str(&format!("{},{c},{c},{c},{c},1\n", ts, c = close));
            }
            std::fs::write(dir.path().join(format!("{}_60.csv", symbol)), rows).unwrap();
        };
        write("BTCUSDT", &[100.0, 101.0, 102.0]);
        write("ETHUSDT", &[10.0, 11.0, 12.0]);

        let paper = Arc::new(PaperExchange::new(1_000.0, 0.001, 5.0));
        let feed = CsvReplayFeed::new(
            CandleCsvHistory::new(dir.path()),
            vec!["BTCUSDT".to_string(), "ETHUSDT".to_string(), "MISSING".to_string()],
            2,
            Duration::ZERO,
        )
        .with_paper_prices(Arc::clone(&paper));

        let (tx, mut rx) = mpsc::channel(16);
        let sent = feed.run(tx, Arc::new(Notify::new())).await;
        assert_eq!(sent, 4);

        let mut order = Vec::new();
        while let Ok(event) = rx.try_recv() {
            order.push((event.symbol, event.candle.close));
        }
        assert_eq!(
            order,
            vec![
                ("BTCUSDT".to_string(), 101.0),
                ("ETHUSDT".to_string(), 11.0),
                ("BTCUSDT".to_string(), 102.0),
                ("ETHUSDT".to_string(), 12.0),
            ]
        );
    }
}
