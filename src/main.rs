use metabot::{
    arguments::{get_config_path_override, get_enabled_debug_modes, patterns, print_help},
    config,
    logger::{self as logger, LogTag},
    paths,
};
use std::path::PathBuf;

/// Main entry point for metabot
///
/// - `--help` prints usage and exits
/// - Otherwise loads config, prepares the data directories and runs the orchestrator
///   until Ctrl+C or `--duration` elapses
#[tokio::main]
async fn main() {
    // Check for help request first (before any other processing)
    if patterns::is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    // Config first: it may relocate the base directory
    let config_path = get_config_path_override()
        .map(PathBuf::from)
        .unwrap_or_else(paths::get_config_path);
    if let Err(e) = config::load_config_from_path(&config_path) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let base_dir = config::with_config(|cfg| cfg.paths.base_dir.clone());
    if !base_dir.trim().is_empty() {
        paths::set_base_directory(&base_dir);
    }

    // Ensure all directories exist BEFORE logger initialization
    // (Logger needs logs directory to create log files)
    if let Err(e) = paths::ensure_all_directories() {
        eprintln!("❌ Failed to create required directories: {}", e);
        std::process::exit(1);
    }

    logger::init();

    logger::info(LogTag::System, "🚀 metabot starting up...");
    logger::info(
        LogTag::System,
        &format!(
            "📁 Base directory: {} (config: {})",
            paths::get_base_directory().display(),
            config_path.display()
        ),
    );

    let debug_modes = get_enabled_debug_modes();
    if !debug_modes.is_empty() {
        logger::info(
            LogTag::System,
            &format!("🐛 Debug modes: {}", debug_modes.join(", ")),
        );
    }

    match metabot::run::run_bot().await {
        Ok(()) => {
            logger::info(LogTag::System, "✅ metabot stopped cleanly");
            logger::flush();
            std::process::exit(0);
        }
        Err(e) => {
            logger::error(LogTag::System, &format!("❌ metabot failed: {}", e));
            logger::flush();
            std::process::exit(1);
        }
    }
}
