//! HTTP handlers.
//!
//! Each handler extracts path parameters, calls [`ImageStorage`] and maps the
//! result to a response. None of them touch the filesystem or sanitise paths
//! themselves.
//!
//! [`ImageStorage`]: crate::storage::ImageStorage

pub mod delete;
pub mod health;
pub mod image;
pub mod list;
pub mod upload;

use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::storage::StorageError;

/// Convert a storage failure, counting server-side ones under `op`.
fn storage_failure(op: &'static str, err: StorageError) -> ApiError {
    let api = ApiError::from(err);
    if api.status().is_server_error() {
        metrics::record_storage_error(op);
    }
    api
}
