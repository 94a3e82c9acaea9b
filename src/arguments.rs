/// Centralized argument handling for metabot
///
/// Command-line flags are read once into CMD_ARGS and queried from anywhere through
/// small helper functions. Debug flags follow the `--debug-<module>` convention and are
/// picked up by the logger at init time.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Debug flag checking functions for all modules
/// - Run-mode flags (paper trading, config override, status only)
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by binaries and tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

/// Model store / registry debug mode
pub fn is_debug_models_enabled() -> bool {
    has_arg("--debug-models")
}

/// Training scheduler debug mode
pub fn is_debug_training_enabled() -> bool {
    has_arg("--debug-training")
}

/// Symbol lifecycle debug mode
pub fn is_debug_symbols_enabled() -> bool {
    has_arg("--debug-symbols")
}

/// Performance guard debug mode
pub fn is_debug_guard_enabled() -> bool {
    has_arg("--debug-guard")
}

/// Positions / reconciliation debug mode
pub fn is_debug_positions_enabled() -> bool {
    has_arg("--debug-positions")
}

/// Exchange boundary debug mode
pub fn is_debug_exchange_enabled() -> bool {
    has_arg("--debug-exchange")
}

/// Risk sizing and limits debug mode
pub fn is_debug_risk_enabled() -> bool {
    has_arg("--debug-risk")
}

/// Orchestration loop debug mode
pub fn is_debug_orchestrator_enabled() -> bool {
    has_arg("--debug-orchestrator")
}

/// Health / status / alerts debug mode
pub fn is_debug_monitor_enabled() -> bool {
    has_arg("--debug-monitor")
}

/// System operations debug mode
pub fn is_debug_system_enabled() -> bool {
    has_arg("--debug-system")
}

// =============================================================================
// RUN MODE FLAGS
// =============================================================================

/// Paper mode - trades against the in-memory simulated venue
pub fn is_paper_enabled() -> bool {
    has_arg("--paper")
}

/// Disables automatic background training even when the config enables it
pub fn is_no_training_enabled() -> bool {
    has_arg("--no-training")
}

/// Config path override (`--config <path>`)
pub fn get_config_path_override() -> Option<String> {
    get_arg_value("--config")
}

/// Run for a fixed number of seconds, then shut down (`--duration <secs>`)
pub fn get_run_duration_seconds() -> Option<u64> {
    get_arg_value("--duration").and_then(|s| s.parse().ok())
}

// =============================================================================
// HELP SYSTEM
// =============================================================================

/// Displays the help menu with all available flags and their descriptions
pub fn print_help() {
    println!("metabot - Adaptive trading orchestrator");
    println!();
    println!("USAGE:");
    println!("    metabot [FLAGS]");
    println!();
    println!("CORE FLAGS:");
    println!("    --config <path>           Use a specific config.toml");
    println!("    --paper                   Trade against the simulated paper venue");
    println!("    --no-training             Never submit background training jobs");
    println!("    --duration <secs>         Stop after the given number of seconds");
    println!("    --help, -h                Show this help message");
    println!();
    println!("DEBUG FLAGS:");
    println!("    --debug-models            Model store and registry");
    println!("    --debug-training          Background training scheduler");
    println!("    --debug-symbols           Symbol lifecycle controller");
    println!("    --debug-guard             Performance guard");
    println!("    --debug-positions         Position book and reconciliation");
    println!("    --debug-exchange          Exchange boundary");
    println!("    --debug-risk              Sizing, limits and kill switch");
    println!("    --debug-orchestrator      Orchestration loop");
    println!("    --debug-monitor           Health, status file and alerts");
    println!("    --debug-system            System operations");
    println!("    --verbose                 Very detailed tracing for every module");
    println!();
    println!("EXAMPLES:");
    println!("    metabot --paper                             # Paper trading");
    println!("    metabot --paper --debug-symbols             # Trace symbol decisions");
    println!("    metabot --config ./config.toml --duration 600");
}

// =============================================================================
// UTILITY FUNCTIONS
// =============================================================================

/// Gets a list of all enabled debug modes
pub fn get_enabled_debug_modes() -> Vec<&'static str> {
    let checks: [(&'static str, fn() -> bool); 10] = [
        ("models", is_debug_models_enabled),
        ("training", is_debug_training_enabled),
        ("symbols", is_debug_symbols_enabled),
        ("guard", is_debug_guard_enabled),
        ("positions", is_debug_positions_enabled),
        ("exchange", is_debug_exchange_enabled),
        ("risk", is_debug_risk_enabled),
        ("orchestrator", is_debug_orchestrator_enabled),
        ("monitor", is_debug_monitor_enabled),
        ("system", is_debug_system_enabled),
    ];

    checks
        .iter()
        .filter(|(_, enabled)| enabled())
        .map(|(name, _)| *name)
        .collect()
}

/// Common argument parsing patterns used across binaries
pub mod patterns {
    use super::*;

    /// Checks for help flags
    pub fn is_help_requested() -> bool {
        has_arg("--help") || has_arg("-h")
    }

    /// Checks for verbose mode
    pub fn is_verbose_mode() -> bool {
        has_arg("--verbose") || has_arg("-v")
    }
}
