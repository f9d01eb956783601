//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging → Open storage → Bind listener
//!
//! Shutdown:
//!     signals.rs (SIGTERM/SIGINT) → shutdown.rs broadcast → server drains → exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last so traffic only arrives once storage is ready

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
