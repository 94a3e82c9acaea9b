//! Current model reference
//!
//! `ModelSnapshot` is an immutable, validated view of one published revision.
//! `ModelHandle` holds the live `Arc<ModelSnapshot>`; readers clone the Arc and keep a
//! consistent view for as long as they need it. Only the orchestration loop calls
//! `refresh`, so the swap is the one write on this path.

use super::metadata::ModelMetadata;
use super::store::ModelStore;
use crate::errors::BotResult;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug)]
pub struct ModelSnapshot {
    metadata: ModelMetadata,
    model_bytes: Vec<u8>,
    scaler_bytes: Vec<u8>,
    loaded_at: DateTime<Utc>,
}

impl ModelSnapshot {
    pub fn new(metadata: ModelMetadata, model_bytes: Vec<u8>, scaler_bytes: Vec<u8>) -> Self {
        Self {
            metadata,
            model_bytes,
            scaler_bytes,
            loaded_at: Utc::now(),
        }
    }

    /// Placeholder used until the first version is published (nothing is tradable)
    pub fn empty(version: &str) -> Self {
        Self::new(ModelMetadata::empty(version), Vec::new(), Vec::new())
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn trained_symbols(&self) -> &BTreeSet<String> {
        &self.metadata.trained_symbols
    }

    pub fn is_trained(&self, symbol: &str) -> bool {
        self.metadata.is_trained(symbol)
    }

    pub fn revision(&self) -> u64 {
        self.metadata.revision
    }

    pub fn version_id(&self) -> String {
        self.metadata.version_id()
    }

    pub fn encoding_index(&self, symbol: &str) -> Option<usize> {
        self.metadata.symbol_encoding_map.get(symbol).copied()
    }

    pub fn model_bytes(&self) -> &[u8] {
        &self.model_bytes
    }

    pub fn scaler_bytes(&self) -> &[u8] {
        &self.scaler_bytes
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// What a `refresh` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged { revision: u64 },
    Swapped { from: u64, to: u64, new_symbols: Vec<String> },
    NothingPublished,
}

pub struct ModelHandle {
    current: RwLock<Arc<ModelSnapshot>>,
}

impl ModelHandle {
    pub fn new(initial: ModelSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn current(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the live snapshot, returning the previous one
    pub fn swap(&self, next: ModelSnapshot) -> Arc<ModelSnapshot> {
        let mut guard = self.current.write();
        std::mem::replace(&mut *guard, Arc::new(next))
    }

    /// Reload from the store if a newer revision was committed
    ///
    /// Only metadata is read when the revision is unchanged. On failure the previous
    /// snapshot stays live and the error is returned to the caller.
    pub fn refresh(&self, store: &ModelStore) -> BotResult<ReloadOutcome> {
        let current = self.current();
        let committed = match store.read_metadata()? {
            Some(metadata) => metadata,
            None => return Ok(ReloadOutcome::NothingPublished),
        };

        if committed.revision == current.revision() {
            return Ok(ReloadOutcome::Unchanged {
                revision: current.revision(),
            });
        }

        let next = store.load_latest()?;
        let new_symbols: Vec<String> = next
            .trained_symbols()
            .difference(current.trained_symbols())
            .cloned()
            .collect();
        let outcome = ReloadOutcome::Swapped {
            from: current.revision(),
            to: next.revision(),
            new_symbols: new_symbols.clone(),
        };

        logger::info(
            LogTag::Models,
            &format!(
                "🔄 Model {} -> {} (new symbols: {})",
                current.version_id(),
                next.version_id(),
                if new_symbols.is_empty() {
                    "none".to_string()
                } else {
                    new_symbols.join(", ")
                }
            ),
        );

        self.swap(next);
        Ok(outcome)
    }
}
