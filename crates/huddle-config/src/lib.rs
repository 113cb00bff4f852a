//! Huddle configuration system.
//!
//! TOML-based configuration for the room clients and the signaling relay.
//! All sections use defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use huddle_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config.signaling.server_url);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod toml_writer;
pub mod validation;

pub use schema::*;
pub use toml_loader::{default_config_path, load_default, load_from_path};
pub use toml_writer::save_config_to_path;

use huddle_common::ConfigError;

/// Load config from the platform default path and validate it.
///
/// Creates a commented default file if none exists.
pub fn load_config() -> Result<HuddleConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &HuddleConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
