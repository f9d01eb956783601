//! Router tests driven through `oneshot` against an in-memory backend.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use futures_util::{stream, TryStreamExt};
use image_server::config::ServerConfig;
use image_server::http::build_router;
use image_server::storage::{
    checked_segment, ByteStream, FileInfo, ImageReader, ImageStorage, StorageError,
};
use serde_json::Value;
use tower::ServiceExt;

const KEY: &str = "router-key";
const BOUNDARY: &str = "XBOUNDARYX";

/// Keeps images in a map and counts every call that reaches it.
#[derive(Default)]
struct MemoryStorage {
    files: Mutex<BTreeMap<(String, String), Bytes>>,
    calls: AtomicUsize,
}

impl MemoryStorage {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn info(project: &str, name: &str, size: u64) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            url: format!("mem://{}/{}", project, name),
            size,
            project: project.to_string(),
        }
    }
}

#[async_trait]
impl ImageStorage for MemoryStorage {
    async fn save(
        &self,
        project: &str,
        original_name: &str,
        data: ByteStream<'_>,
    ) -> Result<FileInfo, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let project = checked_segment(project)?;
        let chunks: Vec<Bytes> = data.try_collect().await.map_err(StorageError::Source)?;
        let body = Bytes::from(chunks.concat());

        let mut files = self.files.lock().unwrap();
        let name = format!("{}-{}", files.len(), checked_segment(original_name)?);
        let info = Self::info(&project, &name, body.len() as u64);
        files.insert((project, name), body);
        Ok(info)
    }

    async fn get(&self, project: &str, filename: &str) -> Result<ImageReader, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap();
        let body = files
            .get(&(project.to_string(), filename.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                project: project.to_string(),
                filename: filename.to_string(),
            })?;
        Ok(ImageReader {
            name: filename.to_string(),
            size: body.len() as u64,
            stream: Box::pin(stream::iter(vec![Ok::<_, io::Error>(body)])),
        })
    }

    async fn delete(&self, project: &str, filename: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .remove(&(project.to_string(), filename.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                project: project.to_string(),
                filename: filename.to_string(),
            })
    }

    async fn list(&self, project: &str) -> Result<Vec<FileInfo>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|((p, _), _)| p == project)
            .map(|((p, n), b)| Self::info(p, n, b.len() as u64))
            .collect())
    }
}

fn router_with(storage: Arc<MemoryStorage>, max_upload_bytes: u64) -> Router {
    let mut config = ServerConfig::default();
    config.auth.api_key = KEY.to_string();
    config.storage.max_upload_bytes = max_upload_bytes;
    build_router(&config, storage)
}

fn multipart_body(file_name: &str, mime: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {m}\r\n\r\n",
        b = BOUNDARY,
        f = file_name,
        m = mime
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(project: &str, key: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::post(format!("/api/v1/projects/{}/images", project)).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_unauthorized_requests_never_reach_storage() {
    let storage = Arc::new(MemoryStorage::default());
    let app = router_with(storage.clone(), 1024);

    let requests = vec![
        upload_request("p", None, multipart_body("a.png", "image/png", b"png")),
        upload_request("p", Some("nope"), multipart_body("a.png", "image/png", b"png")),
        Request::get("/api/v1/projects/p/images")
            .body(Body::empty())
            .unwrap(),
        Request::delete("/api/v1/projects/p/images/a.png")
            .header("x-api-key", "")
            .body(Body::empty())
            .unwrap(),
        Request::get("/api/v1/projects/p/images/a.png/download")
            .header("x-api-key", "router-key-but-longer")
            .body(Body::empty())
            .unwrap(),
    ];

    for request in requests {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(json(response).await["error"].is_string());
    }
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn test_empty_key_counts_as_missing() {
    let app = router_with(Arc::new(MemoryStorage::default()), 1024);

    let response = app
        .oneshot(
            Request::get("/api/v1/projects/p/images")
                .header("x-api-key", "")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(response).await["error"], "X-API-Key header is required");
}

#[tokio::test]
async fn test_handlers_work_against_any_backend() {
    let storage = Arc::new(MemoryStorage::default());
    let app = router_with(storage.clone(), 1024);

    let response = app
        .clone()
        .oneshot(upload_request(
            "p",
            Some(KEY),
            multipart_body("a.png", "image/png", b"pixels"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: FileInfo = serde_json::from_value(json(response).await).unwrap();
    assert_eq!(created.size, 6);
    assert_eq!(created.url, format!("mem://p/{}", created.name));

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/i/p/{}", created.name))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "6");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"pixels");

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/v1/projects/p/images")
                .header("x-api-key", KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed: Vec<FileInfo> = serde_json::from_value(json(response).await).unwrap();
    assert_eq!(listed, vec![created.clone()]);

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/v1/projects/p/images/{}", created.name))
                .header("x-api-key", KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(storage.files.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_declared_length_over_limit_skips_storage() {
    let storage = Arc::new(MemoryStorage::default());
    let app = router_with(storage.clone(), 1024);

    let mut request = upload_request("p", Some(KEY), multipart_body("a.png", "image/png", b"x"));
    request
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(10u64 * 1024 * 1024));

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["error"], "File size must not exceed 1024 bytes");
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn test_rejected_content_type_skips_storage() {
    let storage = Arc::new(MemoryStorage::default());
    let app = router_with(storage.clone(), 1024);

    let response = app
        .oneshot(upload_request(
            "p",
            Some(KEY),
            multipart_body("a.html", "text/html", b"<p>"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn test_non_multipart_upload_is_json_error() {
    let storage = Arc::new(MemoryStorage::default());
    let app = router_with(storage.clone(), 1024);

    let request = Request::post("/api/v1/projects/p/images")
        .header("x-api-key", KEY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"file":"a.png"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert!(json(response).await["error"].is_string());
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn test_oversized_stream_fails_inside_save() {
    let storage = Arc::new(MemoryStorage::default());
    let app = router_with(storage.clone(), 8);

    let response = app
        .oneshot(upload_request(
            "p",
            Some(KEY),
            multipart_body("a.png", "image/png", &[7u8; 64]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(storage.calls(), 1);
    assert!(storage.files.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = router_with(Arc::new(MemoryStorage::default()), 1024);

    let response = app
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
