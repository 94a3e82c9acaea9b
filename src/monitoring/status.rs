//! Status file
//!
//! A JSON snapshot of everything an operator needs to judge the bot from the
//! outside: health, model version, per-symbol state, guard, kill switch, positions
//! and training jobs. Rewritten atomically so readers never see a partial file.

use super::health::HealthReport;
use super::trade_log::PnlSummary;
use crate::errors::{BotError, BotResult};
use crate::guard::GuardView;
use crate::models::ModelSnapshot;
use crate::positions::Position;
use crate::risk::KillSwitchView;
use crate::symbols::SymbolRecord;
use crate::training::JobView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelView {
    pub version_id: String,
    pub version: String,
    pub revision: u64,
    pub trained_symbols: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub loaded_at: DateTime<Utc>,
}

impl From<&ModelSnapshot> for ModelView {
    fn from(snapshot: &ModelSnapshot) -> Self {
        let metadata = snapshot.metadata();
        Self {
            version_id: snapshot.version_id(),
            version: metadata.version.clone(),
            revision: snapshot.revision(),
            trained_symbols: snapshot.trained_symbols().iter().cloned().collect(),
            published_at: metadata.published_at,
            loaded_at: snapshot.loaded_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub mode: String,
    pub running: bool,
    pub equity: f64,
    pub health: Option<HealthReport>,
    pub model: ModelView,
    pub symbols: Vec<SymbolRecord>,
    pub guard: GuardView,
    pub kill_switch: KillSwitchView,
    pub positions: Vec<Position>,
    pub training_jobs: Vec<JobView>,
    pub pnl: PnlSummary,
}

impl StatusSnapshot {
    pub fn uptime_secs(&self) -> i64 {
        (self.timestamp - self.started_at).num_seconds()
    }
}

pub fn write_status_file(path: &Path, snapshot: &StatusSnapshot) -> BotResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&serde_json::to_vec_pretty(snapshot)?)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| BotError::Io(e.error))?;
    Ok(())
}

/// `Ok(None)` when no status file has been written yet
pub fn read_status_file(path: &Path) -> BotResult<Option<StatusSnapshot>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| BotError::integrity(&path.display().to_string(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BotError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PerformanceGuardConfig, RiskConfig};
    use crate::guard::PerformanceGuard;
    use crate::risk::KillSwitch;
    use crate::symbols::SymbolState;

    #[test]
    fn test_status_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        assert!(read_status_file(&path).unwrap().is_none());

        let now = Utc::now();
        let mut record = SymbolRecord::new("BTCUSDT");
        record.state = SymbolState::Active;
        let snapshot = StatusSnapshot {
            timestamp: now,
            started_at: now - chrono::Duration::minutes(5),
            mode: "paper".to_string(),
            running: true,
            equity: 10_000.0,
            health: None,
            model: ModelView::from(&ModelSnapshot::empty("1.0")),
            symbols: vec![record],
            guard: PerformanceGuard::new(PerformanceGuardConfig::default(), 10_000.0).view(),
            kill_switch: KillSwitch::new(&RiskConfig::default()).view(now),
            positions: Vec::new(),
            training_jobs: Vec::new(),
            pnl: PnlSummary::default(),
        };

        write_status_file(&path, &snapshot).unwrap();
        let loaded = read_status_file(&path).unwrap().unwrap();
        assert_eq!(loaded.symbols[0].state, SymbolState::Active);
        assert_eq!(loaded.model.version_id, "v1.0#r0");
        assert_eq!(loaded.uptime_secs(), 300);
    }
}
