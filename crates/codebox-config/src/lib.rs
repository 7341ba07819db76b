//! Codebox gateway configuration.
//!
//! TOML-based configuration with full validation. All sections use serde
//! defaults so a partial (or empty) config file works out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use codebox_config::load_config;
//!
//! let config = load_config(None, |config| config.server.bind = "127.0.0.1:3001".into())
//!     .expect("failed to load config");
//! println!("{}", config.server.bind);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{CodeboxConfig, StoreBackend};

use codebox_common::ConfigError;
use std::path::Path;

/// Load config from `path`, or from the platform default path (creating a
/// documented default file if none exists). `overrides` runs before
/// validation, so a value it replaces is never checked.
pub fn load_config(
    path: Option<&Path>,
    overrides: impl FnOnce(&mut CodeboxConfig),
) -> Result<CodeboxConfig, ConfigError> {
    let mut config = match path {
        Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.to_path_buf())),
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}
