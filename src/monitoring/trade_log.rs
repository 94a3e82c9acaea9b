//! Trade log
//!
//! Every fill is appended to a CSV file (`data/trades.csv`). Closing fills carry the
//! realized PnL; the running summary is rebuilt from the file at startup so totals
//! survive restarts.

use crate::errors::{BotError, BotResult};
use crate::exchange::Side;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Table};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub pnl: Option<f64>,
    pub reason: Option<String>,
    pub order_id: String,
    pub model_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlSummary {
    pub total_pnl: f64,
    pub daily_pnl: f64,
    pub closed_trades: usize,
    pub wins: usize,
    pub opened_trades: usize,
}

impl PnlSummary {
    pub fn win_rate(&self) -> Option<f64> {
        if self.closed_trades == 0 {
            None
        } else {
            Some(self.wins as f64 / self.closed_trades as f64)
        }
    }

    fn apply(&mut self, record: &TradeRecord, today: chrono::NaiveDate) {
        match (record.action, record.pnl) {
            (TradeAction::Open, _) => self.opened_trades += 1,
            (TradeAction::Close, Some(pnl)) => {
                self.total_pnl += pnl;
                self.closed_trades += 1;
                if pnl > 0.0 {
                    self.wins += 1;
                }
                if record.timestamp.date_naive() == today {
                    self.daily_pnl += pnl;
                }
            }
            (TradeAction::Close, None) => self.closed_trades += 1,
        }
    }

    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Metric", "Value"]);
        table.add_row(vec!["Total PnL".to_string(), format!("{:+.2}", self.total_pnl)]);
        table.add_row(vec!["Today PnL".to_string(), format!("{:+.2}", self.daily_pnl)]);
        table.add_row(vec!["Opened".to_string(), self.opened_trades.to_string()]);
        table.add_row(vec!["Closed".to_string(), self.closed_trades.to_string()]);
        table.add_row(vec![
            "Win rate".to_string(),
            self.win_rate()
                .map(|wr| format!("{:.1}%", wr * 100.0))
                .unwrap_or_else(|| "-".to_string()),
        ]);
        table.to_string()
    }
}

pub struct TradeLog {
    path: PathBuf,
    summary: PnlSummary,
}

impl TradeLog {
    /// Open the log, rebuilding the summary from existing rows
    pub fn open(path: impl Into<PathBuf>) -> BotResult<Self> {
        let path = path.into();
        let summary = Self::read_summary(&path, Utc::now())?;
        Ok(Self { path, summary })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary(&self) -> &PnlSummary {
        &self.summary
    }

    pub fn read_records(path: &Path) -> BotResult<Vec<TradeRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| BotError::integrity(&path.display().to_string(), e))?;
        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<TradeRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => logger::warning(
                    LogTag::Monitor,
                    &format!("Skipping trade log row {}: {}", idx + 2, e),
                ),
            }
        }
        Ok(records)
    }

    fn read_summary(path: &Path, now: DateTime<Utc>) -> BotResult<PnlSummary> {
        let today = now.date_naive();
        let mut summary = PnlSummary::default();
        for record in Self::read_records(path)? {
            summary.apply(&record, today);
        }
        Ok(summary)
    }

    pub fn append(&mut self, record: &TradeRecord) -> BotResult<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer
            .serialize(record)
            .map_err(|e| BotError::integrity("trade log", e))?;
        writer.flush()?;

        self.summary.apply(record, Utc::now().date_naive());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(action: TradeAction, pnl: Option<f64>) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now(),
            symbol: "BTCUSDT".to_string(),
            action,
            side: Side::Long,
            quantity: 0.5,
            price: 100.0,
            pnl,
            reason: pnl.map(|_| "TAKE_PROFIT".to_string()),
            order_id: "paper-1".to_string(),
            model_version: "v1.0#r2".to_string(),
        }
    }

    #[test]
    fn test_append_and_rebuild_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");

        let mut log = TradeLog::open(&path).unwrap();
        log.append(&record(TradeAction::Open, None)).unwrap();
        log.append(&record(TradeAction::Close, Some(12.5))).unwrap();
        log.append(&record(TradeAction::Close, Some(-2.5))).unwrap();
        assert_eq!(log.summary().closed_trades, 2);
        assert_eq!(log.summary().win_rate(), Some(0.5));

        let reopened = TradeLog::open(&path).unwrap();
        assert_eq!(reopened.summary(), log.summary());
        assert!((reopened.summary().total_pnl - 10.0).abs() < 1e-9);
        assert!((reopened.summary().daily_pnl - 10.0).abs() < 1e-9);
        assert_eq!(TradeLog::read_records(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_summary_table_renders() {
        let summary = PnlSummary {
            total_pnl: 5.0,
            closed_trades: 1,
            wins: 1,
            ..Default::default()
        };
        let rendered = summary.render_table();
        assert!(rendered.contains("Win rate"));
        assert!(rendered.contains("100.0%"));
    }
}
