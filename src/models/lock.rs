//! Publish lock for the model store
//!
//! Mutual exclusion between training workers is a lock file created with
//! `create_new` (fails if it exists). Contention is retried at a fixed spacing for a
//! bounded number of attempts, then reported as `BotError::ConcurrencyConflict`.
//! A lock file older than `stale_after` is treated as abandoned (crashed writer) and
//! removed. The returned guard deletes the file on drop.
//!
//! Acquisition blocks the calling thread; callers run on the blocking pool.

use crate::errors::{BotError, BotResult};
use crate::logger::{self, LogTag};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    pub max_attempts: u32,
    pub retry_interval: Duration,
    pub stale_after: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_interval: Duration::from_millis(500),
            stale_after: Duration::from_secs(600),
        }
    }
}

/// Held publish lock; released when dropped
#[derive(Debug)]
pub struct PublishLock {
    path: PathBuf,
}

impl PublishLock {
    pub fn acquire(path: &Path, policy: &LockPolicy) -> BotResult<PublishLock> {
        let attempts = policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let _ = writeln!(
                        file,
                        "pid={} acquired_at={}",
                        std::process::id(),
                        chrono::Utc::now().to_rfc3339()
                    );
                    if attempt > 1 {
                        logger::debug(
                            LogTag::Models,
                            &format!(
                                "🔒 Acquired {} after {} attempts",
                                path.display(),
                                attempt
                            ),
                        );
                    }
                    return Ok(PublishLock {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if break_if_stale(path, policy.stale_after) {
                        // Retry immediately; the attempt still counts.
                        continue;
                    }
                    if attempt < attempts {
                        std::thread::sleep(policy.retry_interval);
                    }
                }
                Err(e) => {
                    return Err(BotError::transient(
                        "acquire publish lock",
                        format!("{}: {}", path.display(), e),
                    ));
                }
            }
        }

        logger::warning(
            LogTag::Models,
            &format!(
                "⏳ Publish lock {} busy after {} attempts",
                path.display(),
                attempts
            ),
        );
        Err(BotError::ConcurrencyConflict {
            path: path.display().to_string(),
            attempts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PublishLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                logger::error(
                    LogTag::Models,
                    &format!("Failed to release lock {}: {}", self.path.display(), e),
                );
            }
        }
    }
}

/// Remove a lock file whose mtime is older than `stale_after`
fn break_if_stale(path: &Path, stale_after: Duration) -> bool {
    let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => return false,
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age < stale_after {
        return false;
    }

    logger::warning(
        LogTag::Models,
        &format!(
            "🧹 Breaking stale publish lock {} (age {}s)",
            path.display(),
            age.as_secs()
        ),
    );
    std::fs::remove_file(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> LockPolicy {
        LockPolicy {
            max_attempts,
            retry_interval: Duration::from_millis(10),
            stale_after: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_config_v1.0.json.lock");

        let lock = PublishLock::acquire(&path, &fast_policy(1)).unwrap();
        assert!(path.exists());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_contention_exhausts_into_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_config_v1.0.json.lock");

        let _held = PublishLock::acquire(&path, &fast_policy(1)).unwrap();
        let err = PublishLock::acquire(&path, &fast_policy(3)).unwrap_err();
        match err {
            BotError::ConcurrencyConflict { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_waiter_gets_lock_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_config_v1.0.json.lock");

        let held = PublishLock::acquire(&path, &fast_policy(1)).unwrap();
        let waiter_path = path.clone();
        let waiter = std::thread::spawn(move || {
            PublishLock::acquire(&waiter_path, &fast_policy(200)).map(|_| ())
        });
        std::thread::sleep(Duration::from_millis(50));
        drop(held);

        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_config_v1.0.json.lock");
        std::fs::write(&path, "pid=0").unwrap();

        let policy = LockPolicy {
            max_attempts: 2,
            retry_interval: Duration::from_millis(10),
            stale_after: Duration::ZERO,
        };
        assert!(PublishLock::acquire(&path, &policy).is_ok());
    }
}
