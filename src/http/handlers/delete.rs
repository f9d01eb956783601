use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::handlers::storage_failure;
use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// `DELETE /api/v1/projects/{project}/images/{filename}`
pub async fn delete(
    State(state): State<AppState>,
    Path((project, filename)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state
        .storage
        .delete(&project, &filename)
        .await
        .map_err(|e| storage_failure("delete", e))?;

    metrics::record_delete();
    tracing::info!(project = %project, filename = %filename, "Deleted image");

    Ok(Json(DeleteResponse {
        message: "Deleted".to_string(),
    }))
}
