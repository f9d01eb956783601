//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Development API key. Any real deployment must override it.
pub const DEFAULT_API_KEY: &str = "dev-secret-key";

/// Root configuration for the image server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind host, port).
    pub listener: ListenerConfig,

    /// Upload storage and public URL settings.
    pub storage: StorageConfig,

    /// Management API authentication.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Socket address string the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listener.host, self.listener.port)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port (`PORT`).
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for uploaded files (`UPLOAD_DIR`).
    pub upload_dir: String,

    /// Prefix for public image URLs (`BASE_URL`).
    pub base_url: String,

    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,

    /// Content types accepted on upload.
    pub allowed_content_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "./uploads".to_string(),
            base_url: "http://localhost:8080".to_string(),
            max_upload_bytes: 10 * 1024 * 1024, // 10 MiB
            allowed_content_types: ["image/jpeg", "image/png", "image/gif", "image/webp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Management API authentication.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret expected in `X-API-Key` (`API_KEY`).
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: DEFAULT_API_KEY.to_string(),
        }
    }
}

impl AuthConfig {
    /// True when the development placeholder key is still in use.
    pub fn is_default_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
