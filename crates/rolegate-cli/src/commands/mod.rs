//! CLI command implementations.

pub mod config;
pub mod gateway;
pub mod hash_password;
pub mod secret;
pub mod token;

use std::path::Path;

use anyhow::{Context, Result};
use rolegate_core::Config;

pub use config::run_config;
pub use gateway::run_gateway;
pub use hash_password::run_hash_password;
pub use secret::run_secret_generate;
pub use token::run_token_decode;

/// Load configuration from `path` or the default location, then apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };

    config
        .with_env_overrides()
        .context("Invalid environment override")
}
