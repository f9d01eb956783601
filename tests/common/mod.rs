//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image_server::config::ServerConfig;
use image_server::http::HttpServer;
use image_server::lifecycle::Shutdown;
use image_server::storage::LocalStorage;
use reqwest::multipart::{Form, Part};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-api-key";

/// A server bound to an ephemeral port with its own upload directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with<F>(customize: F) -> Self
    where
        F: FnOnce(&mut ServerConfig),
    {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = ServerConfig::default();
        config.listener.host = "127.0.0.1".to_string();
        config.listener.port = addr.port();
        config.storage.upload_dir = dir.path().to_string_lossy().into_owned();
        config.storage.base_url = format!("http://{}", addr);
        config.auth.api_key = API_KEY.to_string();
        customize(&mut config);

        let storage = LocalStorage::new(dir.path(), &config.storage.base_url);
        let server = HttpServer::new(config, Arc::new(storage));
        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();

        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        Self {
            addr,
            dir,
            client,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn images_url(&self, project: &str) -> String {
        self.url(&format!("/api/v1/projects/{}/images", project))
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Upload with the test API key.
    pub async fn upload(&self, project: &str, form: Form) -> reqwest::Response {
        self.client
            .post(self.images_url(project))
            .header("X-API-Key", API_KEY)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    /// List with the test API key.
    pub async fn list(&self, project: &str) -> reqwest::Response {
        self.client
            .get(self.images_url(project))
            .header("X-API-Key", API_KEY)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// A multipart form with a single `file` part.
pub fn image_form(file_name: &str, mime: &str, data: Vec<u8>) -> Form {
    let part = Part::bytes(data)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .unwrap();
    Form::new().part("file", part)
}

/// Regular files directly under `dir`, ignoring anything missing.
#[allow(dead_code)]
pub fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
