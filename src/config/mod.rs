//! Configuration system
//!
//! - `config_struct!` declares each section with its defaults
//! - `schemas` holds every section and the root `Config`
//! - `utils` loads, reloads and exposes the global instance

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{
    get_config_clone, is_config_initialized, load_config, load_config_from_path, read_config_file, reload_config,
    save_config, with_config,
};
