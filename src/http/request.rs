//! Request identification.
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An incoming `x-request-id` is kept, otherwise a UUID v4 is generated
//! - The ID is echoed back on the response

use axum::{body::Body, http::Request};
use tracing::Span;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Span for one request, tagged with its ID.
pub fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}
