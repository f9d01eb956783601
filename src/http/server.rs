//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Mount the public image route outside the API key layer
//! - Wire up middleware (tracing, request ID, upload body limit)
//! - Bind server to listener and drain on shutdown

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    middleware,
    routing::{delete, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ServerConfig, StorageConfig};
use crate::http::handlers;
use crate::http::handlers::upload::MULTIPART_OVERHEAD;
use crate::http::middleware::{api_key_middleware, ApiKeyState};
use crate::http::request::{request_span, X_REQUEST_ID};
use crate::storage::ImageStorage;

/// Upload constraints derived from configuration.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            allowed_types: config
                .allowed_content_types
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether a declared content type is on the allow-list.
    ///
    /// Parameters such as `; charset=...` are ignored.
    pub fn allows(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_types.iter().any(|t| *t == essence)
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ImageStorage>,
    pub uploads: Arc<UploadPolicy>,
}

/// Build the Axum router with all middleware layers.
pub fn build_router(config: &ServerConfig, storage: Arc<dyn ImageStorage>) -> Router {
    let state = AppState {
        storage,
        uploads: Arc::new(UploadPolicy::from_config(&config.storage)),
    };
    let body_limit = (config.storage.max_upload_bytes + MULTIPART_OVERHEAD) as usize;
    let auth = ApiKeyState::new(&config.auth.api_key);

    let api = Router::new()
        .route(
            "/projects/{project}/images",
            get(handlers::list::list)
                .post(handlers::upload::upload)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/projects/{project}/images/{filename}",
            delete(handlers::delete::delete),
        )
        .route(
            "/projects/{project}/images/{filename}/download",
            get(handlers::image::download),
        )
        .route_layer(middleware::from_fn_with_state(auth, api_key_middleware));

    let request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/i/{project}/{filename}", get(handlers::image::serve))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
}

/// HTTP server for the image service.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and storage backend.
    pub fn new(config: ServerConfig, storage: Arc<dyn ImageStorage>) -> Self {
        let router = build_router(&config, storage);
        Self { router, config }
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upload_dir = %self.config.storage.upload_dir,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> UploadPolicy {
        UploadPolicy::from_config(&StorageConfig::default())
    }

    #[test]
    fn test_allow_list() {
        let policy = policy();
        for ty in ["image/jpeg", "image/png", "image/gif", "image/webp"] {
            assert!(policy.allows(ty), "{} should be allowed", ty);
        }
        assert!(policy.allows("IMAGE/PNG"));
        assert!(policy.allows("image/png; name=x"));
        assert!(!policy.allows("image/svg+xml"));
        assert!(!policy.allows("application/octet-stream"));
        assert!(!policy.allows(""));
    }

    #[test]
    fn test_policy_limit_from_config() {
        assert_eq!(policy().max_bytes, 10 * 1024 * 1024);
    }
}
