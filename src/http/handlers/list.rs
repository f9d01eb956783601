use axum::{
    extract::{Path, State},
    Json,
};

use crate::http::error::ApiError;
use crate::http::handlers::storage_failure;
use crate::http::server::AppState;
use crate::storage::FileInfo;

/// `GET /api/v1/projects/{project}/images`
pub async fn list(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> Result<Json<Vec<FileInfo>>, ApiError> {
    let files = state
        .storage
        .list(&project)
        .await
        .map_err(|e| storage_failure("list", e))?;

    tracing::debug!(project = %project, count = files.len(), "Listed images");
    Ok(Json(files))
}
