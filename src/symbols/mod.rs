//! Symbol lifecycle
//!
//! Decides per symbol whether it may trade (ACTIVE) or why not, and submits untrained
//! symbols with enough history to the training scheduler.

pub mod controller;
pub mod history;
pub mod state;

pub use controller::{ControllerSettings, SymbolController};
pub use history::{CandleCsvHistory, HistoryMetrics, HistorySource, PrefetchedHistory};
pub use state::{SymbolRecord, SymbolState};
