//! Image storage subsystem.
//!
//! # Data Flow
//! ```text
//! handler (project, filename, body stream)
//!     → sanitize.rs (strip traversal sequences from every segment)
//!     → ImageStorage implementation (local.rs today)
//!     → {upload_dir}/{project}/{timestamp}{ext}
//! ```
//!
//! # Design Decisions
//! - The filesystem is the source of truth; no index or sidecar metadata
//! - Handlers never touch the filesystem directly, only this trait
//! - Stored names are generated, the uploaded name only contributes its extension
//! - Reads are returned as streams so handlers never buffer whole files

pub mod local;
pub mod sanitize;

use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalStorage;
pub use sanitize::{checked_segment, sanitize_segment};

/// A fallible stream of byte chunks, used for both uploads and reads.
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'a>>;

/// Metadata describing a stored image, derived from the filesystem at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub project: String,
}

/// An open stored image. Dropping it releases the underlying handle.
pub struct ImageReader {
    /// Sanitised stored name.
    pub name: String,
    /// Size in bytes at open time.
    pub size: u64,
    pub stream: ByteStream<'static>,
}

impl std::fmt::Debug for ImageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageReader")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid path segment: {0:?}")]
    InvalidName(String),

    #[error("file not found: {project}/{filename}")]
    NotFound { project: String, filename: String },

    #[error("failed to create directory: {0}")]
    CreateDir(#[source] io::Error),

    #[error("failed to write file: {0}")]
    Write(#[source] io::Error),

    #[error("failed to read upload: {0}")]
    Source(#[source] io::Error),

    #[error("failed to list files: {0}")]
    Read(#[source] io::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Capability interface for image storage backends.
///
/// All implementations must be thread-safe (Send + Sync) for use in async
/// contexts. Every segment passed in is untrusted and must be sanitised by
/// the implementation.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Persist `data` under a generated name in `project`.
    ///
    /// The project is created on first use. Only the extension of
    /// `original_name` is kept. A failure never leaves a visible file behind.
    async fn save(
        &self,
        project: &str,
        original_name: &str,
        data: ByteStream<'_>,
    ) -> Result<FileInfo, StorageError>;

    /// Open a stored image for streaming.
    async fn get(&self, project: &str, filename: &str) -> Result<ImageReader, StorageError>;

    /// Permanently remove a stored image.
    async fn delete(&self, project: &str, filename: &str) -> Result<(), StorageError>;

    /// Enumerate the images in `project`.
    ///
    /// A project that was never created yields an empty list.
    async fn list(&self, project: &str) -> Result<Vec<FileInfo>, StorageError>;
}
