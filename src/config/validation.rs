//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (upload cap > 0, parsable addresses)
//! - Check the public base URL is absolute http(s)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth.api_key must not be empty")]
    EmptyApiKey,

    #[error("storage.upload_dir must not be empty")]
    EmptyUploadDir,

    #[error("storage.base_url {0:?} is not an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("storage.max_upload_bytes must be greater than zero")]
    ZeroUploadLimit,

    #[error("storage.allowed_content_types must not be empty")]
    NoAllowedTypes,

    #[error("storage.allowed_content_types entry {0:?} is not an image type")]
    NonImageType(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.api_key.is_empty() {
        errors.push(ValidationError::EmptyApiKey);
    }

    if config.storage.upload_dir.trim().is_empty() {
        errors.push(ValidationError::EmptyUploadDir);
    }

    let base_url_ok = Url::parse(&config.storage.base_url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false);
    if !base_url_ok {
        errors.push(ValidationError::InvalidBaseUrl(config.storage.base_url.clone()));
    }

    if config.storage.max_upload_bytes == 0 {
        errors.push(ValidationError::ZeroUploadLimit);
    }

    if config.storage.allowed_content_types.is_empty() {
        errors.push(ValidationError::NoAllowedTypes);
    }
    for ty in &config.storage.allowed_content_types {
        if !ty.starts_with("image/") {
            errors.push(ValidationError::NonImageType(ty.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
