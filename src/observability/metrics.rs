//! Metrics collection and exposition.
//!
//! # Metrics
//! - `image_uploads_total` (counter): successful uploads
//! - `image_upload_bytes_total` (counter): bytes persisted by uploads
//! - `image_upload_rejections_total` (counter): rejected uploads by reason
//! - `image_serves_total` (counter): file streams opened, by mode (inline/attachment)
//! - `image_deletes_total` (counter): successful deletes
//! - `image_storage_errors_total` (counter): server-side storage failures by operation
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an exporter is installed
//! - Project names are not used as labels to keep cardinality bounded

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_upload(bytes: u64) {
    metrics::counter!("image_uploads_total").increment(1);
    metrics::counter!("image_upload_bytes_total").increment(bytes);
}

pub fn record_upload_rejected(reason: &'static str) {
    metrics::counter!("image_upload_rejections_total", "reason" => reason).increment(1);
}

pub fn record_serve(mode: &'static str) {
    metrics::counter!("image_serves_total", "mode" => mode).increment(1);
}

pub fn record_delete() {
    metrics::counter!("image_deletes_total").increment(1);
}

pub fn record_storage_error(op: &'static str) {
    metrics::counter!("image_storage_errors_total", "op" => op).increment(1);
}
