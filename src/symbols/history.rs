//! Candle history collaborator
//!
//! The controller only needs two numbers per symbol: how many days of hourly history
//! exist and how complete they are. `CandleCsvHistory` reads them from
//! `historical_data/{SYMBOL}_60.csv` (timestamp, open, high, low, close, volume).

use crate::errors::{BotError, BotResult};
use crate::exchange::Candle;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HistoryMetrics {
    pub available_days: u32,
    /// Fraction of expected hourly candles present, 0.0..=1.0
    pub coverage_pct: f64,
}

impl HistoryMetrics {
    pub fn new(available_days: u32, coverage_pct: f64) -> Self {
        Self {
            available_days,
            coverage_pct,
        }
    }

    /// Derive metrics from sorted hourly candles
    pub fn from_candles(candles: &[Candle]) -> Self {
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            return Self::default();
        };
        let days = (last.timestamp - first.timestamp).num_days().max(0);
        let expected = (days * 24) as f64;
        let coverage_pct = if expected > 0.0 {
            (candles.len() as f64 / expected).min(1.0)
        } else {
            0.0
        };
        Self {
            available_days: days as u32,
            coverage_pct,
        }
    }
}

pub trait HistorySource: Send + Sync {
    /// `DataIntegrity` when history is missing or unreadable
    fn history_metrics(&self, symbol: &str) -> BotResult<HistoryMetrics>;
}

/// Metrics read ahead of an evaluation pass, off the decision task
///
/// Each entry answers one lookup; symbols that were not collected report a
/// `DataIntegrity` error for the pass.
#[derive(Debug, Default)]
pub struct PrefetchedHistory {
    entries: Mutex<HashMap<String, BotResult<HistoryMetrics>>>,
}

impl PrefetchedHistory {
    /// Blocking: reads every symbol through `source`
    pub fn collect(source: &dyn HistorySource, symbols: &[String]) -> Self {
        let entries = symbols
            .iter()
            .map(|symbol| (symbol.clone(), source.history_metrics(symbol)))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl HistorySource for PrefetchedHistory {
    fn history_metrics(&self, symbol: &str) -> BotResult<HistoryMetrics> {
        self.entries
            .lock()
            .remove(symbol)
            .unwrap_or_else(|| Err(BotError::integrity(symbol, "history not collected for this pass")))
    }
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(millis) = raw.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[derive(Debug, Clone)]
pub struct CandleCsvHistory {
    dir: PathBuf,
}

impl CandleCsvHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_60.csv", symbol))
    }

    /// Read all candles for `symbol`, sorted by timestamp
    pub fn read_candles(&self, symbol: &str) -> BotResult<Vec<Candle>> {
        read_candle_file(&self.file_for(symbol), symbol)
    }
}

impl HistorySource for CandleCsvHistory {
    fn history_metrics(&self, symbol: &str) -> BotResult<HistoryMetrics> {
        let candles = self.read_candles(symbol)?;
        Ok(HistoryMetrics::from_candles(&candles))
    }
}

fn read_candle_file(path: &Path, symbol: &str) -> BotResult<Vec<Candle>> {
    if !path.exists() {
        return Err(BotError::integrity(
            symbol,
            format!("no history file at {}", path.display()),
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| BotError::integrity(symbol, format!("open {}: {}", path.display(), e)))?;

    let mut candles = Vec::new();
    for (idx, row) in reader.deserialize::<CandleRow>().enumerate() {
        let row = row.map_err(|e| BotError::integrity(symbol, format!("row {}: {}", idx + 2, e)))?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
            BotError::integrity(symbol, format!("row {}: bad timestamp '{}'", idx + 2, row.timestamp))
        })?;
        candles.push(Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_hourly(dir: &Path, symbol: &str, hours: i64, skip_every: Option<i64>) {
        let mut file = std::fs::File::create(dir.join(format!("{}_60.csv", symbol))).unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for h in 0..=hours {
            if let Some(n) = skip_every {
                if h % n == 1 {
                    continue;
                }
            }
            let ts = start + chrono::Duration::hours(h);
            writeln!(file, "{},1,2,0.5,1.5,100", ts.timestamp_millis()).unwrap();
        }
    }

    #[test]
    fn test_full_hourly_history() {
        let dir = tempfile::tempdir().unwrap();
        write_hourly(dir.path(), "BTCUSDT", 24 * 120, None);

        let metrics = CandleCsvHistory::new(dir.path()).history_metrics("BTCUSDT").unwrap();
        assert_eq!(metrics.available_days, 120);
        assert!((metrics.coverage_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_gappy_history_lowers_coverage() {
        let dir = tempfile::tempdir().unwrap();
        write_hourly(dir.path(), "ETHUSDT", 24 * 100, Some(2));

        let metrics = CandleCsvHistory::new(dir.path()).history_metrics("ETHUSDT").unwrap();
        assert_eq!(metrics.available_days, 100);
        assert!(metrics.coverage_pct > 0.45 && metrics.coverage_pct < 0.55);
    }

    #[test]
    fn test_missing_file_is_data_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let err = CandleCsvHistory::new(dir.path()).history_metrics("NOPE").unwrap_err();
        assert!(matches!(err, BotError::DataIntegrity { .. }));
    }

    #[test]
    fn test_rfc3339_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("SOLUSDT_60.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-02T00:00:00Z,1,1,1,1,1\n2024-01-01T00:00:00Z,1,1,1,1,1\n",
        )
        .unwrap();
        let candles = CandleCsvHistory::new(dir.path()).read_candles("SOLUSDT").unwrap();
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
    }

    #[test]
    fn test_empty_history_metrics() {
        assert_eq!(HistoryMetrics::from_candles(&[]), HistoryMetrics::default());
    }

    #[test]
    fn test_prefetched_history_serves_collected_symbols() {
        let dir = tempfile::tempdir().unwrap();
        write_hourly(dir.path(), "BTCUSDT", 24 * 30, None);
        let source = CandleCsvHistory::new(dir.path());

        let prefetched = PrefetchedHistory::collect(
            &source,
            &["BTCUSDT".to_string(), "NOPE".to_string()],
        );
        assert_eq!(prefetched.len(), 2);
        assert_eq!(prefetched.history_metrics("BTCUSDT").unwrap().available_days, 30);
        assert!(matches!(
            prefetched.history_metrics("NOPE"),
            Err(BotError::DataIntegrity { .. })
        ));
        // not part of the pass
        assert!(matches!(
            prefetched.history_metrics("ETHUSDT"),
            Err(BotError::DataIntegrity { .. })
        ));
    }
}
