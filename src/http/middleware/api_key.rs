//! Shared-key authentication for the management API.
//!
//! Requests must carry `X-API-Key` equal to the configured secret. The public
//! image route is mounted outside this layer.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::ApiError;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// State for the auth middleware.
#[derive(Clone)]
pub struct ApiKeyState {
    key: Arc<str>,
}

impl ApiKeyState {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self {
            key: Arc::from(key.as_ref()),
        }
    }

    fn matches(&self, presented: &[u8]) -> bool {
        constant_time_eq(presented, self.key.as_bytes())
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Only the length is allowed to leak.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn api_key_middleware(
    State(state): State<ApiKeyState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = match request
        .headers()
        .get(API_KEY_HEADER)
        .filter(|v| !v.is_empty())
    {
        Some(value) => value.as_bytes(),
        None => {
            tracing::debug!(path = %request.uri().path(), "Missing API key");
            return ApiError::Unauthorized("X-API-Key header is required".to_string())
                .into_response();
        }
    };

    if !state.matches(presented) {
        tracing::warn!(path = %request.uri().path(), "Rejected invalid API key");
        return ApiError::Unauthorized("Invalid API key".to_string()).into_response();
    }

    next.run(request).await
}
