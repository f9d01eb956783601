//! Multipart image upload.
//!
//! The `file` field is streamed straight into storage. The size cap is
//! enforced three times: against the declared `Content-Length`, by
//! `DefaultBodyLimit` on the route, and by counting bytes during the copy.

use std::io;

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    Json,
};
use futures_util::{Stream, StreamExt};

use crate::http::error::ApiError;
use crate::http::handlers::storage_failure;
use crate::http::server::{AppState, UploadPolicy};
use crate::observability::metrics;
use crate::storage::{ByteStream, FileInfo};

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Allowance for multipart boundaries and part headers on top of the file cap.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// `POST /api/v1/projects/{project}/images`
pub async fn upload(
    State(state): State<AppState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<FileInfo>), ApiError> {
    let policy = state.uploads.as_ref();
    let mut multipart = multipart.map_err(|e| {
        metrics::record_upload_rejected("not_multipart");
        ApiError::BadRequest(e.body_text())
    })?;

    if let Some(declared) = declared_length(&headers) {
        if declared > policy.max_bytes + MULTIPART_OVERHEAD {
            metrics::record_upload_rejected("too_large");
            return Err(too_large(policy));
        }
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e.body_text())))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        return store_field(&state, policy, &project, field).await;
    }

    metrics::record_upload_rejected("missing_file");
    Err(ApiError::BadRequest(format!(
        "No file provided. Send it in the '{}' field",
        FILE_FIELD
    )))
}

async fn store_field(
    state: &AppState,
    policy: &UploadPolicy,
    project: &str,
    field: Field<'_>,
) -> Result<(StatusCode, Json<FileInfo>), ApiError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !policy.allows(&content_type) {
        metrics::record_upload_rejected("content_type");
        return Err(ApiError::BadRequest(format!(
            "Only image uploads are allowed ({}), got {:?}",
            policy.allowed_types.join(", "),
            content_type
        )));
    }

    let original_name = field.file_name().unwrap_or_default().to_string();
    let data = capped(field, policy.max_bytes);

    let info = state
        .storage
        .save(project, &original_name, data)
        .await
        .map_err(|e| storage_failure("save", e))?;

    metrics::record_upload(info.size);
    tracing::info!(
        project = %info.project,
        filename = %info.name,
        size = info.size,
        content_type = %content_type,
        "Stored upload"
    );

    Ok((StatusCode::CREATED, Json(info)))
}

/// Adapt a multipart field into a byte stream that fails once `max` is exceeded.
fn capped<'a, S, E>(field: S, max: u64) -> ByteStream<'a>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'a,
    E: std::fmt::Display,
{
    let mut seen = 0u64;
    Box::pin(field.map(move |chunk| {
        let chunk = chunk.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        seen += chunk.len() as u64;
        if seen > max {
            metrics::record_upload_rejected("too_large");
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file exceeds the {} byte limit", max),
            ));
        }
        Ok(chunk)
    }))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn too_large(policy: &UploadPolicy) -> ApiError {
    ApiError::BadRequest(format!(
        "File size must not exceed {} bytes",
        policy.max_bytes
    ))
}
