pub mod arguments;
pub mod config;
pub mod errors; // Structured error handling
pub mod exchange;
pub mod guard; // Performance guard state machine
pub mod logger;
pub mod models; // Versioned model store and live handle
pub mod monitoring;
pub mod orchestrator;
pub mod paths;
pub mod positions;
pub mod risk;
pub mod run;
pub mod symbols; // Symbol lifecycle controller
pub mod training; // Background training scheduler
