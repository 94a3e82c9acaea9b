use super::schemas::Config;
/// Configuration utilities - loading, reloading, and access helpers
///
/// - Loading configuration from disk (defaults when the file is absent)
/// - Hot-reloading configuration at runtime
/// - Thread-safe access helpers
///
/// Core components never read the global directly; `main` clones the sections they
/// need and hands them over at construction.
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::logger::{self, LogTag};
use crate::paths;

/// Global configuration instance
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Path the config was loaded from, reused by reload/save
static CONFIG_PATH: OnceCell<PathBuf> = OnceCell::new();

/// Load configuration from the default location (`data/config.toml`)
pub fn load_config() -> Result<(), String> {
    load_config_from_path(&paths::get_config_path())
}

/// Parse a config file without touching the global instance
pub fn read_config_file(path: &Path) -> Result<Config, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let config = toml::from_str::<Config>(&contents)
        .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

    config
        .validate()
        .map_err(|e| format!("Invalid config file '{}': {}", path.display(), e))?;

    Ok(config)
}

/// Load configuration from a specific file path and initialize the global CONFIG
///
/// If the file doesn't exist the schema defaults are used.
pub fn load_config_from_path(path: &Path) -> Result<(), String> {
    let config = if path.exists() {
        read_config_file(path)?
    } else {
        eprintln!(
            "⚠️  Config file '{}' not found, using default values",
            path.display()
        );
        Config::default()
    };

    let _ = CONFIG_PATH.set(path.to_path_buf());
    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| "Config already initialized".to_string())?;

    Ok(())
}

/// Reload configuration from the path it was loaded from
///
/// The configuration is atomically replaced, so reads are always consistent. Components
/// built from an earlier clone keep their values until they are rebuilt.
pub fn reload_config() -> Result<(), String> {
    let path = CONFIG_PATH
        .get()
        .cloned()
        .unwrap_or_else(paths::get_config_path);
    let new_config = read_config_file(&path)?;

    let config_lock = CONFIG
        .get()
        .ok_or_else(|| "Config not initialized. Call load_config() first.".to_string())?;
    let mut config = config_lock
        .write()
        .map_err(|e| format!("Failed to acquire config write lock: {}", e))?;
    *config = new_config;

    logger::info(
        LogTag::Config,
        &format!("🔄 Configuration reloaded from {}", path.display()),
    );
    Ok(())
}

/// Execute a function with read access to the configuration
///
/// Falls back to schema defaults when the config has not been loaded (tools that only
/// need paths, tests).
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => {
            let config = lock.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&config)
        }
        None => f(&Config::default()),
    }
}

/// Get a clone of the entire configuration
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

/// Save the current configuration to disk
pub fn save_config(path: Option<&Path>) -> Result<(), String> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => CONFIG_PATH
            .get()
            .cloned()
            .unwrap_or_else(paths::get_config_path),
    };

    let config_str = with_config(|cfg| {
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
    })?;

    std::fs::write(&path, config_str)
        .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

    Ok(())
}

/// Check if configuration has been initialized
pub fn is_config_initialized() -> bool {
    CONFIG.get().is_some()
}
