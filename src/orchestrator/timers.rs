//! Wall-clock timers fired from the housekeeping tick

use crate::config::{OperationsConfig, PositionsConfig};
use chrono::{DateTime, Duration, Utc};

/// Fires at most once per `interval`
#[derive(Debug, Clone)]
pub struct Every {
    interval: Duration,
    last: Option<DateTime<Utc>>,
}

impl Every {
    /// Due on the first check
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// First due one interval after `now`
    pub fn starting_at(interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            interval,
            last: Some(now),
        }
    }

    pub fn from_secs(secs: u64, now: DateTime<Utc>) -> Self {
        Self::starting_at(Duration::seconds(secs as i64), now)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last {
            None => true,
            Some(last) => now - last >= self.interval,
        }
    }

    /// True (and re-armed) when due
    pub fn fire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.last = Some(now);
        true
    }

    /// Make the next check fire regardless of the interval
    pub fn trigger_next(&mut self) {
        self.last = None;
    }
}

#[derive(Debug, Clone)]
pub struct LoopTimers {
    pub reconcile: Every,
    pub coverage: Every,
    pub drain: Every,
    pub heartbeat: Every,
    pub health: Every,
    pub status: Every,
}

impl LoopTimers {
    /// All timers armed at `now`; startup has already done each job once
    pub fn from_config(positions: &PositionsConfig, ops: &OperationsConfig, now: DateTime<Utc>) -> Self {
        Self {
            reconcile: Every::from_secs(positions.reconcile_interval_secs, now),
            coverage: Every::from_secs(ops.coverage_check_interval_secs, now),
            drain: Every::from_secs(ops.job_drain_interval_secs, now),
            heartbeat: Every::from_secs(ops.heartbeat_interval_secs, now),
            health: Every::from_secs(ops.health_check_interval_secs, now),
            status: Every::from_secs(ops.status_file_interval_secs, now),
        }
    }
}
