//! Training job records
//!
//! A job's status lives in an atomic cell shared between the scheduler and the worker;
//! the worker's result travels back through its `JoinHandle`.

use super::trainer::TrainingFailure;
use crate::errors::BotError;
use crate::models::ModelMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum JobStatus {
    Queued = 0,
    Running = 1,
    Succeeded = 2,
    Failed = 3,
}

impl JobStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => JobStatus::Queued,
            1 => JobStatus::Running,
            2 => JobStatus::Succeeded,
            _ => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }
}

/// Status shared between scheduler and worker
#[derive(Debug, Clone)]
pub struct StatusCell(Arc<AtomicU8>);

impl StatusCell {
    pub fn new(status: JobStatus) -> Self {
        Self(Arc::new(AtomicU8::new(status as u8)))
    }

    pub fn get(&self) -> JobStatus {
        JobStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, status: JobStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

#[derive(Debug)]
pub enum JobError {
    Training(TrainingFailure),
    Publish(BotError),
    /// Worker panicked or was cancelled by the runtime
    Aborted(String),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::Training(failure) => write!(f, "{}", failure),
            JobError::Publish(err) => write!(f, "publish failed: {}", err),
            JobError::Aborted(msg) => write!(f, "worker aborted: {}", msg),
        }
    }
}

impl JobError {
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, JobError::Training(TrainingFailure::InsufficientData(_)))
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, JobError::Publish(BotError::ConcurrencyConflict { .. }))
    }

    pub fn into_bot_error(self, symbol: &str) -> BotError {
        match self {
            JobError::Publish(err) => err,
            other => BotError::Training {
                symbol: symbol.to_string(),
                failure: other.to_string(),
            },
        }
    }
}

pub type JobResult = Result<ModelMetadata, JobError>;

/// A job that is queued or running
#[derive(Debug)]
pub struct TrainingJob {
    pub symbol: String,
    pub history_days: u32,
    pub status: StatusCell,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub handle: Option<JoinHandle<JobResult>>,
}

impl TrainingJob {
    pub fn queued(symbol: &str, history_days: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            history_days,
            status: StatusCell::new(JobStatus::Queued),
            queued_at: Utc::now(),
            started_at: None,
            handle: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(false)
    }
}

/// A terminal job collected by `drain_finished`
#[derive(Debug)]
pub struct FinishedJob {
    pub symbol: String,
    pub status: JobStatus,
    pub result: JobResult,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

/// Serializable view for the status file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub symbol: String,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&TrainingJob> for JobView {
    fn from(job: &TrainingJob) -> Self {
        Self {
            symbol: job.symbol.clone(),
            status: job.status.get(),
            queued_at: job.queued_at,
            started_at: job.started_at,
        }
    }
}
