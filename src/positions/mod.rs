//! Positions
//!
//! The book holds at most one record per symbol. Reconciliation against the exchange
//! is a pure merge returning the next book; the orchestration loop swaps it in.

pub mod book;
pub mod reconcile;
pub mod types;

pub use book::PositionBook;
pub use reconcile::{log_report, reconcile, ReconcileDefaults, ReconcileReport, ReconcileResult};
pub use types::{protective_levels, ExitReason, Position, PositionOrigin};
