//! Background training
//!
//! - `trainer`: the trainer collaborator seam and the external-program adapter
//! - `job`: job records, shared status cells, outcomes
//! - `scheduler`: bounded worker pool, at most one job per symbol
//! - `queue`: persisted queue file for out-of-process training

pub mod job;
pub mod queue;
pub mod scheduler;
pub mod trainer;

pub use job::{FinishedJob, JobError, JobStatus, JobView};
pub use queue::{update_queue_file, TrainingQueueFile};
pub use scheduler::TrainingScheduler;
pub use trainer::{CommandTrainer, ModelTrainer, TrainingFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started,
    Queued,
    AlreadyPending,
    Halted,
}

impl SubmitOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Started | SubmitOutcome::Queued | SubmitOutcome::AlreadyPending)
    }
}

/// What the symbol controller needs from a scheduler
pub trait TrainingSubmitter {
    /// A job for the symbol is queued, running, or finished but not yet collected
    fn is_pending(&self, symbol: &str) -> bool;
    fn accepts_submissions(&self) -> bool;
    /// `available_days` is the history the symbol has; the configured window caps it
    fn submit(&mut self, symbol: &str, available_days: u32) -> SubmitOutcome;
}
