//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → PORT / UPLOAD_DIR / BASE_URL / API_KEY overrides (loader.rs)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to storage, auth and handlers
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; nothing reads the environment afterwards
//! - All fields have defaults to allow running with no config at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, ListenerConfig, LogFormat, ObservabilityConfig, ServerConfig, StorageConfig,
    DEFAULT_API_KEY,
};
pub use validation::ValidationError;
