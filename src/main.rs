//! Image Server
//!
//! A small HTTP service for storing images per project on local disk.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ axum router ──┬─▶ GET /i/{project}/{filename}      (public)
//!                              │
//!                              └─▶ /api/v1 ─▶ X-API-Key check ─▶ upload / list /
//!                                                                download / delete
//!                                       │
//!                                       ▼
//!                              ImageStorage (trait) ─▶ LocalStorage
//!                                                        {upload_dir}/{project}/{ts}{ext}
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use image_server::config::load_config;
use image_server::http::HttpServer;
use image_server::lifecycle::{signals, Shutdown};
use image_server::observability::{logging, metrics};
use image_server::storage::LocalStorage;

#[derive(Parser, Debug)]
#[command(name = "image-server", version, about = "Project-scoped image storage over HTTP")]
struct Args {
    /// Optional TOML configuration file; PORT, UPLOAD_DIR, BASE_URL and API_KEY override it.
    #[arg(short, long, env = "IMAGE_SERVER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability)?;

    tracing::info!("image-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.bind_address(),
        upload_dir = %config.storage.upload_dir,
        base_url = %config.storage.base_url,
        max_upload_bytes = config.storage.max_upload_bytes,
        "Configuration loaded"
    );
    if config.auth.is_default_key() {
        tracing::warn!("API_KEY not set, using the development key (insecure for production)");
    }

    if config.observability.metrics_enabled {
        // Address was checked during validation.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let storage = LocalStorage::new(&config.storage.upload_dir, &config.storage.base_url);
    storage.ensure_root().await?;

    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, Arc::new(storage));
    let server_shutdown = shutdown.subscribe();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
