//! Shared configuration utilities
//!
//! Generic YAML loading/saving plus the default file locations used by the
//! analysis crate.
//!
//! ```ignore
//! use cadence_core::config::{load_config, save_config, default_config_path};
//!
//! let path = default_config_path("config.yaml");
//! let config: MyConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;

pub use io::{load_config, read_yaml, save_config};
pub use paths::{
    default_config_dir, default_config_path, default_models_dir, default_rules_path,
    default_scratch_dir,
};
