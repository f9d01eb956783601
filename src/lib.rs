//! Image Server Library
//!
//! Uploads, lists, serves, downloads and deletes image files grouped by
//! project, stored on the local filesystem.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod storage;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use storage::{FileInfo, ImageStorage, LocalStorage, StorageError};
