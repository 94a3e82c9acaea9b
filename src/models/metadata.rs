//! Published model metadata and its merge rules
//!
//! A `ModelMetadata` record describes one published version of the multi-symbol model.
//! New training results arrive as single-symbol records and are folded into the
//! previous version with `merge_metadata`, a pure function with one rule per field:
//!
//! | field                         | rule                                   |
//! |-------------------------------|----------------------------------------|
//! | `trained_symbols`             | union                                  |
//! | `symbol_history_days`         | per-key union (incoming wins on a key) |
//! | `symbol_encoding_map`         | union, existing indices never change   |
//! | `symbol_performance`          | per-key union (incoming wins on a key) |
//! | `performance`                 | latest                                 |
//! | `training_days`               | max                                    |
//! | `min_history_days_per_symbol` | min                                    |
//! | `training_end_timestamp`      | max                                    |
//! | `revision`                    | previous + 1                           |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Named evaluation metrics (precision, auc, ...)
pub type Metrics = BTreeMap<String, f64>;

/// A file in the models directory plus its sha256
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub file: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub model: ArtifactRef,
    pub scaler: ArtifactRef,
}

fn default_training_mode() -> String {
    "multi_symbol".to_string()
}

fn default_encoding_type() -> String {
    "index".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub trained_symbols: BTreeSet<String>,
    #[serde(default)]
    pub symbol_history_days: BTreeMap<String, u32>,
    #[serde(default)]
    pub symbol_encoding_map: BTreeMap<String, usize>,
    #[serde(default)]
    pub performance: Metrics,
    #[serde(default)]
    pub symbol_performance: BTreeMap<String, Metrics>,
    #[serde(default)]
    pub training_days: u32,
    #[serde(default)]
    pub min_history_days_per_symbol: Option<u32>,
    #[serde(default)]
    pub training_end_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_training_mode")]
    pub training_mode: String,
    #[serde(default = "default_encoding_type")]
    pub symbol_encoding_type: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub artifacts: Option<ArtifactSet>,
}

/// Result of training one symbol, as reported by the trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFragment {
    pub symbol: String,
    pub history_days: u32,
    #[serde(default)]
    pub performance: Metrics,
    #[serde(default)]
    pub training_end_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_training_mode")]
    pub training_mode: String,
    #[serde(default = "default_encoding_type")]
    pub symbol_encoding_type: String,
}

impl MetadataFragment {
    pub fn new(symbol: &str, history_days: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            history_days,
            performance: Metrics::new(),
            training_end_timestamp: None,
            features: Vec::new(),
            training_mode: default_training_mode(),
            symbol_encoding_type: default_encoding_type(),
        }
    }
}

impl ModelMetadata {
    /// Metadata of a version nothing has been published to yet (revision 0)
    pub fn empty(version: &str) -> Self {
        Self {
            version: version.to_string(),
            revision: 0,
            trained_symbols: BTreeSet::new(),
            symbol_history_days: BTreeMap::new(),
            symbol_encoding_map: BTreeMap::new(),
            performance: Metrics::new(),
            symbol_performance: BTreeMap::new(),
            training_days: 0,
            min_history_days_per_symbol: None,
            training_end_timestamp: None,
            features: Vec::new(),
            training_mode: default_training_mode(),
            symbol_encoding_type: default_encoding_type(),
            published_at: None,
            artifacts: None,
        }
    }

    /// Single-symbol record built from a training result
    pub fn from_fragment(version: &str, fragment: &MetadataFragment) -> Self {
        let mut metadata = Self::empty(version);
        metadata.trained_symbols.insert(fragment.symbol.clone());
        metadata
            .symbol_history_days
            .insert(fragment.symbol.clone(), fragment.history_days);
        metadata
            .symbol_encoding_map
            .insert(fragment.symbol.clone(), 0);
        metadata.performance = fragment.performance.clone();
        if !fragment.performance.is_empty() {
            metadata
                .symbol_performance
                .insert(fragment.symbol.clone(), fragment.performance.clone());
        }
        metadata.training_days = fragment.history_days;
        metadata.min_history_days_per_symbol = Some(fragment.history_days);
        metadata.training_end_timestamp = fragment.training_end_timestamp;
        metadata.features = fragment.features.clone();
        metadata.training_mode = fragment.training_mode.clone();
        metadata.symbol_encoding_type = fragment.symbol_encoding_type.clone();
        metadata
    }

    /// Version id used in logs: `v{version}#r{revision}`
    pub fn version_id(&self) -> String {
        format!("v{}#r{}", self.version, self.revision)
    }

    pub fn is_trained(&self, symbol: &str) -> bool {
        self.trained_symbols.contains(symbol)
    }

    /// Next free slot in the encoding map
    fn next_encoding_index(&self) -> usize {
        self.symbol_encoding_map
            .values()
            .max()
            .map(|max| max + 1)
            .unwrap_or(0)
    }
}

/// Fold `incoming` into `previous`, producing the next revision
///
/// `previous = None` means nothing has been published for this version yet.
/// `published_at` and `artifacts` are left for the store to fill in.
pub fn merge_metadata(previous: Option<&ModelMetadata>, incoming: &ModelMetadata) -> ModelMetadata {
    let base = match previous {
        Some(prev) => prev.clone(),
        None => ModelMetadata::empty(&incoming.version),
    };

    let mut merged = base.clone();
    merged.revision = base.revision + 1;

    merged
        .trained_symbols
        .extend(incoming.trained_symbols.iter().cloned());

    for (symbol, days) in &incoming.symbol_history_days {
        merged.symbol_history_days.insert(symbol.clone(), *days);
    }

    for (symbol, metrics) in &incoming.symbol_performance {
        merged
            .symbol_performance
            .insert(symbol.clone(), metrics.clone());
    }

    // Keep the incoming relative order for symbols new to this version
    let mut new_symbols: Vec<(&String, &usize)> = incoming
        .symbol_encoding_map
        .iter()
        .filter(|(symbol, _)| !merged.symbol_encoding_map.contains_key(*symbol))
        .collect();
    new_symbols.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
    for (symbol, _) in new_symbols {
        let index = merged.next_encoding_index();
        merged.symbol_encoding_map.insert(symbol.clone(), index);
    }

    // Trained symbols missing from the incoming encoding still need a slot
    let unencoded: Vec<String> = incoming
        .trained_symbols
        .iter()
        .filter(|symbol| !merged.symbol_encoding_map.contains_key(*symbol))
        .cloned()
        .collect();
    for symbol in unencoded {
        let index = merged.next_encoding_index();
        merged.symbol_encoding_map.insert(symbol, index);
    }

    if !incoming.performance.is_empty() {
        merged.performance = incoming.performance.clone();
    }

    merged.training_days = base.training_days.max(incoming.training_days);

    merged.min_history_days_per_symbol = match (
        base.min_history_days_per_symbol,
        incoming.min_history_days_per_symbol,
    ) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    merged.training_end_timestamp =
        match (base.training_end_timestamp, incoming.training_end_timestamp) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

    if !incoming.features.is_empty() {
        merged.features = incoming.features.clone();
    }
    merged.training_mode = incoming.training_mode.clone();
    merged.symbol_encoding_type = incoming.symbol_encoding_type.clone();

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fragment(symbol: &str, days: u32) -> ModelMetadata {
        ModelMetadata::from_fragment("1.0", &MetadataFragment::new(symbol, days))
    }

    #[test]
    fn test_first_publish_starts_at_revision_one() {
        let merged = merge_metadata(None, &fragment("BTCUSDT", 400));
        assert_eq!(merged.revision, 1);
        assert!(merged.is_trained("BTCUSDT"));
        assert_eq!(merged.symbol_encoding_map["BTCUSDT"], 0);
        assert_eq!(merged.version_id(), "v1.0#r1");
    }

    #[test]
    fn test_encoding_indices_are_stable() {
        let v1 = merge_metadata(None, &fragment("BTCUSDT", 400));
        let v2 = merge_metadata(Some(&v1), &fragment("ETHUSDT", 300));
        let v3 = merge_metadata(Some(&v2), &fragment("BTCUSDT", 500));

        assert_eq!(v3.symbol_encoding_map["BTCUSDT"], 0);
        assert_eq!(v3.symbol_encoding_map["ETHUSDT"], 1);
        assert_eq!(v3.revision, 3);
        assert_eq!(v3.symbol_history_days["BTCUSDT"], 500);
    }

    #[test]
    fn test_numeric_field_rules() {
        let v1 = merge_metadata(None, &fragment("BTCUSDT", 400));
        let v2 = merge_metadata(Some(&v1), &fragment("ETHUSDT", 120));

        assert_eq!(v2.training_days, 400);
        assert_eq!(v2.min_history_days_per_symbol, Some(120));
    }

    #[test]
    fn test_training_end_timestamp_takes_max() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut a = MetadataFragment::new("BTCUSDT", 400);
        a.training_end_timestamp = Some(late);
        let mut b = MetadataFragment::new("ETHUSDT", 400);
        b.training_end_timestamp = Some(early);

        let v1 = merge_metadata(None, &ModelMetadata::from_fragment("1.0", &a));
        let v2 = merge_metadata(Some(&v1), &ModelMetadata::from_fragment("1.0", &b));
        assert_eq!(v2.training_end_timestamp, Some(late));
    }

    #[test]
    fn test_merge_is_commutative_on_coverage() {
        let a = fragment("BTCUSDT", 400);
        let b = fragment("ETHUSDT", 300);

        let ab = merge_metadata(Some(&merge_metadata(None, &a)), &b);
        let ba = merge_metadata(Some(&merge_metadata(None, &b)), &a);

        assert_eq!(ab.trained_symbols, ba.trained_symbols);
        assert_eq!(ab.symbol_history_days, ba.symbol_history_days);
        assert_eq!(ab.training_days, ba.training_days);
        assert_eq!(ab.min_history_days_per_symbol, ba.min_history_days_per_symbol);
        assert_eq!(ab.revision, ba.revision);
    }

    #[test]
    fn test_coverage_never_shrinks() {
        let mut current: Option<ModelMetadata> = None;
        let mut seen = BTreeSet::new();
        for symbol in ["BTCUSDT", "ETHUSDT", "BTCUSDT", "SOLUSDT", "ETHUSDT"] {
            let next = merge_metadata(current.as_ref(), &fragment(symbol, 200));
            assert!(next.trained_symbols.is_superset(&seen));
            seen = next.trained_symbols.clone();
            current = Some(next);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_metadata_json_tolerates_missing_fields() {
        let json = r#"{"version":"1.0","trained_symbols":["BTCUSDT"]}"#;
        let parsed: ModelMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.revision, 0);
        assert!(parsed.is_trained("BTCUSDT"));
        assert_eq!(parsed.training_mode, "multi_symbol");
    }
}
