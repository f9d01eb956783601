//! Local filesystem storage backend.
//!
//! Layout: `{root}/{project}/{timestamp}{ext}`. Uploads are written to a
//! hidden partial file in the project directory and renamed into place once
//! the whole stream is on disk, so a failed upload never becomes visible.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::storage::sanitize::{checked_segment, sanitize_segment};
use crate::storage::{ByteStream, FileInfo, ImageReader, ImageStorage, StorageError};

/// Filesystem-backed [`ImageStorage`].
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
    /// Last timestamp handed out, keeps generated names strictly increasing.
    last_stamp: AtomicU64,
}

impl LocalStorage {
    /// Create a backend rooted at `root`, publishing URLs under `base_url`.
    pub fn new(root: impl Into<PathBuf>, base_url: impl AsRef<str>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            last_stamp: AtomicU64::new(0),
        }
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(StorageError::CreateDir)
    }

    fn public_url(&self, project: &str, filename: &str) -> String {
        format!("{}/i/{}/{}", self.base_url, project, filename)
    }

    /// Nanoseconds since the epoch, bumped past the previous value on collision.
    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        let mut prev = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_stamp.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    fn generate_name(&self, original_name: &str) -> String {
        format!(
            "{}{}",
            self.next_stamp(),
            sanitize_segment(extension_of(original_name))
        )
    }

    /// Resolve an existing file, hiding partial uploads and directories.
    fn file_path(&self, project: &str, filename: &str) -> Result<(String, String, PathBuf), StorageError> {
        let project = checked_segment(project)?;
        let filename = checked_segment(filename)?;
        if filename.starts_with('.') {
            return Err(StorageError::NotFound { project, filename });
        }
        let path = self.root.join(&project).join(&filename);
        Ok((project, filename, path))
    }
}

/// Extension of the final path element, including the leading dot.
fn extension_of(name: &str) -> &str {
    let base_start = name
        .rfind(|c| c == '/' || c == '\\')
        .map(|i| i + 1)
        .unwrap_or(0);
    let base = &name[base_start..];
    match base.rfind('.') {
        Some(i) => &base[i..],
        None => "",
    }
}

async fn write_stream(path: &Path, mut data: ByteStream<'_>) -> Result<u64, StorageError> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(StorageError::Write)?;

    let mut written = 0u64;
    while let Some(chunk) = data.next().await {
        let chunk = chunk.map_err(StorageError::Source)?;
        file.write_all(&chunk).await.map_err(StorageError::Write)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(StorageError::Write)?;
    file.sync_all().await.map_err(StorageError::Write)?;
    Ok(written)
}

#[async_trait]
impl ImageStorage for LocalStorage {
    async fn save(
        &self,
        project: &str,
        original_name: &str,
        data: ByteStream<'_>,
    ) -> Result<FileInfo, StorageError> {
        let project = checked_segment(project)?;
        let dir = self.root.join(&project);
        fs::create_dir_all(&dir)
            .await
            .map_err(StorageError::CreateDir)?;

        let filename = self.generate_name(original_name);
        let partial = dir.join(format!(".{}.partial", filename));
        let target = dir.join(&filename);

        let size = match write_stream(&partial, data).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        tracing::warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial upload");
                    }
                }
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&partial, &target).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StorageError::Write(e));
        }

        tracing::debug!(project = %project, filename = %filename, size, "Stored image");

        Ok(FileInfo {
            url: self.public_url(&project, &filename),
            name: filename,
            size,
            project,
        })
    }

    async fn get(&self, project: &str, filename: &str) -> Result<ImageReader, StorageError> {
        let (project, filename, path) = self.file_path(project, filename)?;
        let not_found = || StorageError::NotFound {
            project: project.clone(),
            filename: filename.clone(),
        };

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(StorageError::Io(e)),
        };
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(not_found());
        }

        Ok(ImageReader {
            name: filename.clone(),
            size: meta.len(),
            stream: Box::pin(ReaderStream::new(file)),
        })
    }

    async fn delete(&self, project: &str, filename: &str) -> Result<(), StorageError> {
        let (project, filename, path) = self.file_path(project, filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(project = %project, filename = %filename, "Deleted image");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { project, filename })
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(&self, project: &str) -> Result<Vec<FileInfo>, StorageError> {
        let project = checked_segment(project)?;
        let dir = self.root.join(&project);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Read(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Read)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(project = %project, filename = %name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if meta.is_dir() {
                continue;
            }
            files.push(FileInfo {
                url: self.public_url(&project, &name),
                name,
                size: meta.len(),
                project: project.clone(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}
