//! Handlers for the `/batches` resource.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/batches/{id}/start
///
/// Validate the batch inputs, reset its progress and submit its jobs.
/// Returns the accepted job ids once every submission has been attempted;
/// completion is reconciled in the background.
pub async fn start_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let summary = state.engine.start_batch(&id).await?;

    tracing::info!(
        batch_id = %id,
        requested = summary.requested,
        submitted = summary.submitted,
        "Batch started",
    );

    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/batches/{id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let batch = state.engine.batch(&id).await?;
    Ok(Json(DataResponse { data: batch }))
}
