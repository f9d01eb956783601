//! Streaming stored images back to clients.
//!
//! The open file travels inside the response body and is closed when the body
//! is dropped, whether the transfer completed or the client went away.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::Response,
};

use crate::http::error::ApiError;
use crate::http::handlers::storage_failure;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::storage::ImageReader;

/// 30 days.
pub const PUBLIC_CACHE_CONTROL: &str = "public, max-age=2592000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Inline,
    Attachment,
}

/// `GET /i/{project}/{filename}`, public.
pub async fn serve(
    State(state): State<AppState>,
    Path((project, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let reader = state
        .storage
        .get(&project, &filename)
        .await
        .map_err(|e| storage_failure("get", e))?;

    metrics::record_serve("inline");
    stream_response(reader, Disposition::Inline)
}

/// `GET /api/v1/projects/{project}/images/{filename}/download`
pub async fn download(
    State(state): State<AppState>,
    Path((project, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let reader = state
        .storage
        .get(&project, &filename)
        .await
        .map_err(|e| storage_failure("get", e))?;

    metrics::record_serve("attachment");
    tracing::debug!(project = %project, filename = %reader.name, "Downloading image");
    stream_response(reader, Disposition::Attachment)
}

fn stream_response(reader: ImageReader, disposition: Disposition) -> Result<Response, ApiError> {
    let content_type = mime_guess::from_path(&reader.name).first_or_octet_stream();
    let content_type = HeaderValue::from_str(content_type.as_ref())
        .map_err(|e| ApiError::Internal(format!("invalid content type: {}", e)))?;

    let extra = match disposition {
        Disposition::Inline => (
            header::CACHE_CONTROL,
            HeaderValue::from_static(PUBLIC_CACHE_CONTROL),
        ),
        Disposition::Attachment => (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&attachment_header(&reader.name))
                .map_err(|e| ApiError::Internal(format!("invalid file name: {}", e)))?,
        ),
    };

    let size = reader.size;
    let mut response = Response::new(Body::from_stream(reader.stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(extra.0, extra.1);
    Ok(response)
}

/// `attachment; filename="..."` with quotes and backslashes escaped.
fn attachment_header(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{}\"", escaped)
}
