//! Centralized path resolution for metabot
//!
//! All file and directory paths are resolved through this module so the bot, the tools
//! and the tests agree on where state lives.
//!
//! ## Path Strategy
//!
//! The base directory follows platform standards unless overridden (either through
//! `paths.base_dir` in the config or the `METABOT_HOME` environment variable):
//! - **macOS**: `~/Library/Application Support/metabot/`
//! - **Windows**: `%LOCALAPPDATA%\metabot\`
//! - **Linux**: `$XDG_DATA_HOME/metabot/` (fallback `~/.local/share/metabot/`)
//!
//! ## Directory Structure
//!
//! ```text
//! ~/metabot/
//! ├── data/
//! │ ├── config.toml
//! │ ├── status.json
//! │ ├── training_queue.json
//! │ ├── kill_switch.reset
//! │ └── trades.csv
//! ├── models/
//! │ ├── model_config_v1.0.json
//! │ ├── meta_model_v1.0.r7.bin
//! │ └── feature_scaler_v1.0.r7.bin
//! ├── historical_data/
//! │ └── BTCUSDT_60.csv
//! └── logs/
//!   └── metabot_*.log
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::path::PathBuf;

const APP_DIR: &str = "metabot";

// =============================================================================
// BASE DIRECTORY RESOLUTION
// =============================================================================

/// Explicit override, set from config before services start
static BASE_OVERRIDE: Lazy<RwLock<Option<PathBuf>>> = Lazy::new(|| RwLock::new(None));

/// Platform default, resolved once
static DEFAULT_BASE: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
    if let Ok(home) = std::env::var("METABOT_HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(dir) = dirs::data_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(APP_DIR);
    }

    PathBuf::from(APP_DIR)
}

/// Overrides the base directory (empty string clears the override)
pub fn set_base_directory(dir: &str) {
    let mut guard = BASE_OVERRIDE.write();
    if dir.trim().is_empty() {
        *guard = None;
    } else {
        *guard = Some(PathBuf::from(dir));
    }
}

// =============================================================================
// PRIMARY DIRECTORY ACCESSORS
// =============================================================================

/// Returns the base directory for all metabot data
pub fn get_base_directory() -> PathBuf {
    BASE_OVERRIDE
        .read()
        .clone()
        .unwrap_or_else(|| DEFAULT_BASE.clone())
}

/// Returns the data directory path (config, status, queue, trade log)
pub fn get_data_directory() -> PathBuf {
    get_base_directory().join("data")
}

/// Returns the logs directory path
pub fn get_logs_directory() -> PathBuf {
    get_base_directory().join("logs")
}

/// Returns the models directory path
///
/// Holds every published model version: the metadata json plus the revision-specific
/// model and scaler artifacts it references.
pub fn get_models_directory() -> PathBuf {
    get_base_directory().join("models")
}

/// Returns the hourly candle history directory
pub fn get_historical_data_directory() -> PathBuf {
    get_base_directory().join("historical_data")
}

// =============================================================================
// FILE PATHS
// =============================================================================

/// Returns the main configuration file path
pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

pub fn get_status_file_path() -> PathBuf {
    get_data_directory().join("status.json")
}

pub fn get_training_queue_path() -> PathBuf {
    get_data_directory().join("training_queue.json")
}

pub fn get_trade_log_path() -> PathBuf {
    get_data_directory().join("trades.csv")
}

/// Marker file an operator drops to reset an engaged kill switch
pub fn get_kill_switch_reset_path() -> PathBuf {
    get_data_directory().join("kill_switch.reset")
}

// =============================================================================
// DIRECTORY CREATION
// =============================================================================

/// Ensures all required directories exist
///
/// Called early at startup, before the logger opens its file.
pub fn ensure_all_directories() -> Result<(), String> {
    let dirs_to_create = vec![
        ("base", get_base_directory()),
        ("data", get_data_directory()),
        ("logs", get_logs_directory()),
        ("models", get_models_directory()),
        ("historical_data", get_historical_data_directory()),
    ];

    for (name, dir) in dirs_to_create {
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    dir.display(),
                    e
                )
            })?;

            eprintln!("Created directory: {}", dir.display());
        }
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
