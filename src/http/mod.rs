//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, tracing)
//!     → /i/...       → handlers::image::serve (public)
//!     → /api/v1/...  → middleware::api_key → handlers::{upload,list,image,delete}
//!     → error.rs (uniform {"error": ...} bodies)
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::X_REQUEST_ID;
pub use server::{build_router, AppState, HttpServer, UploadPolicy};
