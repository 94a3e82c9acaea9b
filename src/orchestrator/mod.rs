//! Orchestration loop and its market-side seams

pub mod market;
pub mod runtime;
pub mod timers;


pub use market::{AttachedSignals, CandleBuffer, CsvReplayFeed, MarketEvent, SignalEngine, TradeSignal};
pub use runtime::{LoopStats, Orchestrator, OrchestratorFiles, OrchestratorParts};
pub use timers::{Every, LoopTimers};
