//! Model registry - discovery and selection of published versions
//!
//! Scans the models directory for `model_config_v*.json` and reports, per version
//! label, the committed metadata and whether the referenced artifacts are present.
//! `select_best` ranks complete versions: 10 points per trained symbol, up to 365
//! for recency of `training_end_timestamp`, then major*100 + minor.

use super::metadata::ModelMetadata;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static CONFIG_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^model_config_v(\d+(?:\.\d+)*)\.json$").expect("valid model config regex")
});

#[derive(Debug, Clone)]
pub struct ModelListing {
    pub version: String,
    pub config_path: PathBuf,
    pub metadata: Option<ModelMetadata>,
    /// Metadata parsed and both artifacts exist
    pub complete: bool,
}

impl ModelListing {
    pub fn trained_symbol_count(&self) -> usize {
        self.metadata
            .as_ref()
            .map(|m| m.trained_symbols.len())
            .unwrap_or(0)
    }
}

/// Parse "1.10" into (1, 10); malformed parts count as 0
pub fn version_key(version: &str) -> (u64, u64) {
    let mut parts = version.split('.').map(|p| p.parse::<u64>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    (major, minor)
}

pub struct ModelRegistry {
    dir: PathBuf,
}

impl ModelRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// All versions found, newest version label first
    pub fn list_versions(&self) -> Vec<ModelListing> {
        if !self.dir.exists() {
            logger::debug(
                LogTag::Models,
                &format!("Models directory does not exist: {}", self.dir.display()),
            );
            return Vec::new();
        }

        let pattern = format!(
            "{}/model_config_v*.json",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                logger::warning(LogTag::Models, &format!("Invalid glob {}: {}", pattern, e));
                return Vec::new();
            }
        };

        let mut listings: Vec<ModelListing> = entries
            .filter_map(Result::ok)
            .filter_map(|path| self.describe(&path))
            .collect();

        listings.sort_by(|a, b| version_key(&b.version).cmp(&version_key(&a.version)));
        listings
    }

    fn describe(&self, path: &Path) -> Option<ModelListing> {
        let file_name = path.file_name()?.to_str()?;
        let version = CONFIG_FILE_RE.captures(file_name)?.get(1)?.as_str().to_string();

        let metadata = match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<ModelMetadata>(&s).map_err(|e| e.to_string()))
        {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                logger::warning(
                    LogTag::Models,
                    &format!("Could not load metadata from {}: {}", path.display(), e),
                );
                None
            }
        };

        let complete = metadata
            .as_ref()
            .and_then(|m| m.artifacts.as_ref())
            .map(|a| self.dir.join(&a.model.file).exists() && self.dir.join(&a.scaler.file).exists())
            .unwrap_or(false);

        Some(ModelListing {
            version,
            config_path: path.to_path_buf(),
            metadata,
            complete,
        })
    }

    /// Selection score for a listing at `now`
    pub fn score(listing: &ModelListing, now: DateTime<Utc>) -> i64 {
        let mut score = listing.trained_symbol_count() as i64 * 10;

        if let Some(end) = listing
            .metadata
            .as_ref()
            .and_then(|m| m.training_end_timestamp)
        {
            let days_ago = (now - end).num_days();
            score += (365 - days_ago).max(0);
        }

        let (major, minor) = version_key(&listing.version);
        score + (major * 100 + minor) as i64
    }

    /// Best complete version, optionally restricted to a training mode
    pub fn select_best(&self, training_mode: Option<&str>) -> Option<ModelListing> {
        let now = Utc::now();
        let best = self
            .list_versions()
            .into_iter()
            .filter(|l| l.complete)
            .filter(|l| match (training_mode, l.metadata.as_ref()) {
                (Some(mode), Some(m)) => m.training_mode == mode,
                _ => true,
            })
            .max_by_key(|l| Self::score(l, now))?;

        logger::info(
            LogTag::Models,
            &format!(
                "🏆 Selected model v{} (symbols={}, score={})",
                best.version,
                best.trained_symbol_count(),
                Self::score(&best, now)
            ),
        );
        Some(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::MetadataFragment;
    use crate::models::store::{ModelStore, TrainedArtifact};

    fn publish(dir: &Path, version: &str, symbol: &str) {
        ModelStore::new(dir, version)
            .publish(&TrainedArtifact {
                model_bytes: vec![1],
                scaler_bytes: vec![2],
                fragment: MetadataFragment::new(symbol, 200),
            })
            .unwrap();
    }

    #[test]
    fn test_version_key() {
        assert_eq!(version_key("1.0"), (1, 0));
        assert_eq!(version_key("2.13"), (2, 13));
        assert_eq!(version_key("x"), (0, 0));
    }

    #[test]
    fn test_list_versions_sorted_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        publish(dir.path(), "1.0", "BTCUSDT");
        publish(dir.path(), "2.0", "BTCUSDT");
        std::fs::write(dir.path().join("model_config_v3.0.json"), b"garbage").unwrap();

        let listings = ModelRegistry::new(dir.path()).list_versions();
        let versions: Vec<&str> = listings.iter().map(|l| l.version.as_str()).collect();
        assert_eq!(versions, vec!["3.0", "2.0", "1.0"]);
        assert!(!listings[0].complete);
        assert!(listings[1].complete);
    }

    #[test]
    fn test_select_best_prefers_coverage() {
        let dir = tempfile::tempdir().unwrap();
        publish(dir.path(), "1.0", "BTCUSDT");
        publish(dir.path(), "1.0", "ETHUSDT");
        publish(dir.path(), "1.0", "SOLUSDT");
        publish(dir.path(), "1.1", "BTCUSDT");

        let best = ModelRegistry::new(dir.path()).select_best(None).unwrap();
        assert_eq!(best.version, "1.0");
        assert_eq!(best.trained_symbol_count(), 3);
    }

    #[test]
    fn test_select_best_filters_training_mode() {
        let dir = tempfile::tempdir().unwrap();
        publish(dir.path(), "1.0", "BTCUSDT");
        let registry = ModelRegistry::new(dir.path());
        assert!(registry.select_best(Some("single_symbol")).is_none());
        assert!(registry.select_best(Some("multi_symbol")).is_some());
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let registry = ModelRegistry::new("/definitely/not/here/models");
        assert!(registry.list_versions().is_empty());
    }
}
