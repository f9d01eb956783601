//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment variable {name}={value:?}: {reason}")]
    Env {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply the `PORT`, `UPLOAD_DIR`, `BASE_URL` and `API_KEY` overrides.
///
/// Unset and empty variables leave the current value in place.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(port) = get("PORT") {
        config.listener.port = port.parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
            name: "PORT",
            value: port.clone(),
            reason: e.to_string(),
        })?;
    }
    if let Some(dir) = get("UPLOAD_DIR") {
        config.storage.upload_dir = dir;
    }
    if let Some(base_url) = get("BASE_URL") {
        config.storage.base_url = base_url;
    }
    if let Some(api_key) = get("API_KEY") {
        config.auth.api_key = api_key;
    }
    Ok(())
}

/// Load, override from the process environment, and validate.
///
/// Without a path the built-in defaults are the starting point.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => ServerConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
