/// Logger configuration, built from command-line flags at init
///
/// Holds the minimum level, the per-tag debug/verbose sets and an optional tag filter.
/// Stored globally so `should_log` can consult it from any thread.
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments::{get_arg_value, get_cmd_args, has_arg, patterns};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_tags: HashSet<String>,
    pub verbose_tags: HashSet<String>,
    /// Empty set means every tag is shown
    pub enabled_tags: HashSet<String>,
    pub file_logging: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            file_logging: true,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

pub fn update_logger_config<F: FnOnce(&mut LoggerConfig)>(f: F) {
    let mut guard = LOGGER_CONFIG.write();
    f(&mut guard);
}

/// Build the logger configuration from CMD_ARGS
///
/// `--debug-<tag>` enables DEBUG for one tag, `--verbose` enables everything,
/// `--log-level <level>` sets the threshold, `--log-tags a,b` restricts output.
pub fn init_from_args() {
    let mut config = LoggerConfig::default();
    let args = get_cmd_args();

    for tag in LogTag::all() {
        let key = tag.to_debug_key();
        if args.iter().any(|a| a == &format!("--debug-{}", key)) {
            config.debug_tags.insert(key.clone());
            if config.min_level < LogLevel::Debug {
                config.min_level = LogLevel::Debug;
            }
        }
        if args.iter().any(|a| a == &format!("--verbose-{}", key)) {
            config.verbose_tags.insert(key);
            config.min_level = LogLevel::Verbose;
        }
    }

    if patterns::is_verbose_mode() {
        config.min_level = LogLevel::Verbose;
    }

    if let Some(level) = get_arg_value("--log-level").and_then(|v| LogLevel::from_str(&v)) {
        config.min_level = level;
    }

    if let Some(tags) = get_arg_value("--log-tags") {
        config.enabled_tags = tags
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
    }

    config.file_logging = !has_arg("--no-log-file");

    set_logger_config(config);
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.min_level == LogLevel::Verbose || config.debug_tags.contains(&tag.to_debug_key())
}

pub fn is_verbose_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().verbose_tags.contains(&tag.to_debug_key())
}
