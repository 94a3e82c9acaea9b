//! Persisted training queue
//!
//! `data/training_queue.json` lists symbols waiting for training so an independent
//! process (`tool_process_training_queue`) can train them when the bot does not:
//!
//! ```json
//! {"queued_symbols": ["XRPUSDT"], "queued_at": {"XRPUSDT": "2024-05-01T10:00:00Z"}}
//! ```

use crate::errors::{BotError, BotResult};
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingQueueFile {
    #[serde(default)]
    pub queued_symbols: Vec<String>,
    #[serde(default)]
    pub queued_at: BTreeMap<String, DateTime<Utc>>,
}

impl TrainingQueueFile {
    /// Load the queue; a missing file is an empty queue
    pub fn load(path: &Path) -> BotResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| BotError::integrity(&path.display().to_string(), e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(BotError::Io(e)),
        }
    }

    /// Write through a temp file + rename
    pub fn save(&self, path: &Path) -> BotResult<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(self)?)?;
        tmp.persist(path).map_err(|e| BotError::Io(e.error))?;
        Ok(())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.queued_symbols.iter().any(|s| s == symbol)
    }

    /// Returns true when the symbol was not already queued
    pub fn add(&mut self, symbol: &str, at: DateTime<Utc>) -> bool {
        if self.contains(symbol) {
            return false;
        }
        self.queued_symbols.push(symbol.to_string());
        self.queued_at.insert(symbol.to_string(), at);
        true
    }

    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.queued_symbols.len();
        self.queued_symbols.retain(|s| s != symbol);
        self.queued_at.remove(symbol);
        before != self.queued_symbols.len()
    }
}

/// Add `to_add` and drop `to_remove`, saving only when something changed
pub fn update_queue_file(path: &Path, to_add: &[String], to_remove: &[String]) -> BotResult<bool> {
    let mut queue = TrainingQueueFile::load(path)?;
    let now = Utc::now();

    let added: Vec<&String> = to_add.iter().filter(|s| queue.add(s, now)).collect();
    let removed: Vec<&String> = to_remove.iter().filter(|s| queue.remove(s)).collect();

    if added.is_empty() && removed.is_empty() {
        return Ok(false);
    }

    queue.save(path)?;
    if !added.is_empty() {
        logger::info(
            LogTag::Training,
            &format!(
                "📝 Added {} symbol(s) to training queue: {:?}",
                added.len(),
                added
            ),
        );
    }
    if !removed.is_empty() {
        logger::debug(
            LogTag::Training,
            &format!("Removed {:?} from training queue", removed),
        );
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TrainingQueueFile::load(&dir.path().join("training_queue.json")).unwrap();
        assert!(queue.queued_symbols.is_empty());
    }

    #[test]
    fn test_add_is_deduplicated_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_queue.json");

        let changed = update_queue_file(
            &path,
            &["XRPUSDT".to_string(), "XRPUSDT".to_string()],
            &[],
        )
        .unwrap();
        assert!(changed);
        assert!(!update_queue_file(&path, &["XRPUSDT".to_string()], &[]).unwrap());

        let queue = TrainingQueueFile::load(&path).unwrap();
        assert_eq!(queue.queued_symbols, vec!["XRPUSDT".to_string()]);
        assert!(queue.queued_at.contains_key("XRPUSDT"));
    }

    #[test]
    fn test_remove_clears_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_queue.json");
        update_queue_file(&path, &["XRPUSDT".to_string(), "ADAUSDT".to_string()], &[]).unwrap();
        update_queue_file(&path, &[], &["XRPUSDT".to_string()]).unwrap();

        let queue = TrainingQueueFile::load(&path).unwrap();
        assert_eq!(queue.queued_symbols, vec!["ADAUSDT".to_string()]);
        assert!(!queue.queued_at.contains_key("XRPUSDT"));
    }

    #[test]
    fn test_reads_foreign_format() {
        let json = r#"{"queued_symbols":["LTCUSDT"],"queued_at":{"LTCUSDT":"2024-05-01T10:00:00Z"}}"#;
        let queue: TrainingQueueFile = serde_json::from_str(json).unwrap();
        assert!(queue.contains("LTCUSDT"));
    }
}
