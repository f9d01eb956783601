//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and storage produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every request span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
