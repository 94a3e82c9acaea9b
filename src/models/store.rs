//! Model artifact store
//!
//! On-disk layout for version label `V`:
//!
//! ```text
//! model_config_vV.json          metadata, the commit point
//! model_config_vV.json.lock     publish lock (present only while publishing)
//! meta_model_vV.rN.bin          model artifact of revision N
//! feature_scaler_vV.rN.bin      scaler artifact of revision N
//! ```
//!
//! Publishing writes the revision-specific artifacts first, then replaces the metadata
//! file through a temp file + rename. Readers only follow the metadata, so they see
//! either the previous revision or the new one, never a mix.

use super::handle::ModelSnapshot;
use super::lock::{LockPolicy, PublishLock};
use super::metadata::{merge_metadata, ArtifactRef, ArtifactSet, MetadataFragment, ModelMetadata};
use crate::config::ModelConfig;
use crate::errors::{BotError, BotResult};
use crate::logger::{self, LogTag};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Output of one training job
#[derive(Debug, Clone)]
pub struct TrainedArtifact {
    pub model_bytes: Vec<u8>,
    pub scaler_bytes: Vec<u8>,
    pub fragment: MetadataFragment,
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
    version: String,
    lock_policy: LockPolicy,
    keep_revisions: usize,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>, version: &str) -> Self {
        Self {
            dir: dir.into(),
            version: version.to_string(),
            lock_policy: LockPolicy::default(),
            keep_revisions: 3,
        }
    }

    pub fn from_config(dir: impl Into<PathBuf>, config: &ModelConfig) -> Self {
        Self::new(dir, &config.version)
            .with_lock_policy(LockPolicy {
                max_attempts: config.lock_max_attempts,
                retry_interval: Duration::from_millis(config.lock_retry_interval_ms),
                stale_after: Duration::from_secs(config.lock_stale_secs),
            })
            .with_keep_revisions(config.keep_revisions)
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn with_keep_revisions(mut self, keep: usize) -> Self {
        self.keep_revisions = keep.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir
            .join(format!("model_config_v{}.json", self.version))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir
            .join(format!("model_config_v{}.json.lock", self.version))
    }

    fn model_file_name(&self, revision: u64) -> String {
        format!("meta_model_v{}.r{}.bin", self.version, revision)
    }

    fn scaler_file_name(&self, revision: u64) -> String {
        format!("feature_scaler_v{}.r{}.bin", self.version, revision)
    }

    /// Read the committed metadata; `Ok(None)` when nothing was published yet
    pub fn read_metadata(&self) -> BotResult<Option<ModelMetadata>> {
        let path = self.metadata_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BotError::model_load(&path, e)),
        };
        let metadata: ModelMetadata =
            serde_json::from_str(&contents).map_err(|e| BotError::model_load(&path, e))?;
        Ok(Some(metadata))
    }

    /// Publish one training result as the next revision
    ///
    /// Blocking: acquires the publish lock with bounded retries.
    pub fn publish(&self, artifact: &TrainedArtifact) -> BotResult<ModelMetadata> {
        std::fs::create_dir_all(&self.dir)?;
        let _lock = PublishLock::acquire(&self.lock_path(), &self.lock_policy)?;

        let previous = self.read_metadata()?;
        let incoming = ModelMetadata::from_fragment(&self.version, &artifact.fragment);
        let mut merged = merge_metadata(previous.as_ref(), &incoming);

        let model_file = self.model_file_name(merged.revision);
        let scaler_file = self.scaler_file_name(merged.revision);
        self.write_atomic(&model_file, &artifact.model_bytes)?;
        self.write_atomic(&scaler_file, &artifact.scaler_bytes)?;

        merged.published_at = Some(Utc::now());
        merged.artifacts = Some(ArtifactSet {
            model: ArtifactRef {
                file: model_file,
                sha256: sha256_hex(&artifact.model_bytes),
            },
            scaler: ArtifactRef {
                file: scaler_file,
                sha256: sha256_hex(&artifact.scaler_bytes),
            },
        });

        let json = serde_json::to_vec_pretty(&merged)?;
        let metadata_name = format!("model_config_v{}.json", self.version);
        self.write_atomic(&metadata_name, &json)?;

        logger::info(
            LogTag::Models,
            &format!(
                "📦 Published {} with {} (trained symbols: {})",
                merged.version_id(),
                artifact.fragment.symbol,
                merged.trained_symbols.len()
            ),
        );

        self.prune(merged.revision);
        Ok(merged)
    }

    /// Load and verify the committed version
    pub fn load_latest(&self) -> BotResult<ModelSnapshot> {
        let metadata = self.read_metadata()?.ok_or_else(|| {
            BotError::model_load(&self.metadata_path(), "no published model for this version")
        })?;

        let artifacts = metadata.artifacts.clone().ok_or_else(|| {
            BotError::model_load(&self.metadata_path(), "metadata lists no artifacts")
        })?;

        let model_bytes = self.read_verified(&artifacts.model)?;
        let scaler_bytes = self.read_verified(&artifacts.scaler)?;

        logger::debug(
            LogTag::Models,
            &format!(
                "Loaded {} ({} model bytes, {} scaler bytes)",
                metadata.version_id(),
                model_bytes.len(),
                scaler_bytes.len()
            ),
        );

        Ok(ModelSnapshot::new(metadata, model_bytes, scaler_bytes))
    }

    fn read_verified(&self, artifact: &ArtifactRef) -> BotResult<Vec<u8>> {
        let path = self.dir.join(&artifact.file);
        let bytes = std::fs::read(&path).map_err(|e| BotError::model_load(&path, e))?;
        let actual = sha256_hex(&bytes);
        if actual != artifact.sha256 {
            return Err(BotError::model_load(
                &path,
                format!("checksum mismatch (expected {}, got {})", artifact.sha256, actual),
            ));
        }
        Ok(bytes)
    }

    /// Temp file in the same directory, fsync, rename over the target
    fn write_atomic(&self, file_name: &str, bytes: &[u8]) -> BotResult<()> {
        let target = self.dir.join(file_name);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| BotError::Io(e.error))?;
        Ok(())
    }

    /// Delete artifacts older than the retained revisions (called with the lock held)
    fn prune(&self, current_revision: u64) {
        let keep = self.keep_revisions as u64;
        if current_revision <= keep {
            return;
        }
        let cutoff = current_revision - keep;

        for revision in 1..=cutoff {
            for name in [self.model_file_name(revision), self.scaler_file_name(revision)] {
                let path = self.dir.join(&name);
                match std::fs::remove_file(&path) {
                    Ok(()) => logger::debug(
                        LogTag::Models,
                        &format!("🧹 Pruned old artifact {}", name),
                    ),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => logger::warning(
                        LogTag::Models,
                        &format!("Failed to prune {}: {}", path.display(), e),
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn artifact(symbol: &str, days: u32) -> TrainedArtifact {
        TrainedArtifact {
            model_bytes: format!("model-{}", symbol).into_bytes(),
            scaler_bytes: format!("scaler-{}", symbol).into_bytes(),
            fragment: MetadataFragment::new(symbol, days),
        }
    }

    fn fast_store(dir: &Path) -> ModelStore {
        ModelStore::new(dir, "1.0").with_lock_policy(LockPolicy {
            max_attempts: 200,
            retry_interval: Duration::from_millis(5),
            stale_after: Duration::from_secs(3600),
        })
    }

    #[test]
    fn test_publish_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = fast_store(dir.path());

        let published = store.publish(&artifact("BTCUSDT", 400)).unwrap();
        assert_eq!(published.revision, 1);
        assert!(!store.lock_path().exists());

        let snapshot = store.load_latest().unwrap();
        assert!(snapshot.is_trained("BTCUSDT"));
        assert_eq!(snapshot.model_bytes(), b"model-BTCUSDT");
        assert_eq!(snapshot.revision(), 1);
    }

    #[test]
    fn test_load_without_publish_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = fast_store(dir.path());
        assert!(matches!(store.load_latest(), Err(BotError::ModelLoad { .. })));
        assert!(store.read_metadata().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_artifact_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = fast_store(dir.path());
        let published = store.publish(&artifact("BTCUSDT", 400)).unwrap();

        let model_file = published.artifacts.unwrap().model.file;
        std::fs::write(dir.path().join(model_file), b"tampered").unwrap();

        match store.load_latest() {
            Err(BotError::ModelLoad { reason, .. }) => assert!(reason.contains("checksum")),
            other => panic!("expected checksum failure, got {:?}", other.map(|s| s.revision())),
        }
    }

    #[test]
    fn test_corrupt_metadata_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = fast_store(dir.path());
        std::fs::write(store.metadata_path(), b"{not json").unwrap();
        assert!(matches!(store.read_metadata(), Err(BotError::ModelLoad { .. })));
    }

    #[test]
    fn test_publish_fails_with_conflict_when_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path(), "1.0").with_lock_policy(LockPolicy {
            max_attempts: 3,
            retry_interval: Duration::from_millis(5),
            stale_after: Duration::from_secs(3600),
        });
        std::fs::write(store.lock_path(), b"held elsewhere").unwrap();

        let err = store.publish(&artifact("BTCUSDT", 400)).unwrap_err();
        assert!(matches!(err, BotError::ConcurrencyConflict { attempts: 3, .. }));
        assert!(store.read_metadata().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_publishers_both_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(fast_store(dir.path()));

        let handles: Vec<_> = ["XRPUSDT", "ADAUSDT"]
            .into_iter()
            .map(|symbol| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.publish(&artifact(symbol, 200)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let snapshot = store.load_latest().unwrap();
        assert!(snapshot.is_trained("XRPUSDT"));
        assert!(snapshot.is_trained("ADAUSDT"));
        assert_eq!(snapshot.revision(), 2);
    }

    #[test]
    fn test_old_revisions_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let store = fast_store(dir.path()).with_keep_revisions(2);

        for symbol in ["A", "B", "C", "D"] {
            store.publish(&artifact(symbol, 200)).unwrap();
        }

        assert!(!dir.path().join("meta_model_v1.0.r1.bin").exists());
        assert!(!dir.path().join("meta_model_v1.0.r2.bin").exists());
        assert!(dir.path().join("meta_model_v1.0.r3.bin").exists());
        assert!(dir.path().join("feature_scaler_v1.0.r4.bin").exists());
        assert!(store.load_latest().is_ok());
    }
}
