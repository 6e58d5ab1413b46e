//! Inbound job completion webhook.
//!
//! The job service posts the full prediction object whenever a job
//! completes. Redeliveries are expected and harmless. Anything that does
//! not lead to a merge (non-terminal status, unknown job) is acknowledged
//! with `202` so the service does not retry it.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fanout_engine::push::{IgnoreReason, JobNotification, PushDisposition};
use fanout_jobs::Prediction;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /api/v1/webhooks/jobs
///
/// `200 {"status": "reconciled"}` when the outcome reached the reconciler,
/// `202 {"status": "ignored"}` otherwise. A blank job id is a `400`.
pub async fn receive_job_notification(
    State(state): State<AppState>,
    Json(prediction): Json<Prediction>,
) -> AppResult<impl IntoResponse> {
    if prediction.id.trim().is_empty() {
        return Err(AppError::BadRequest("Notification has no job id".into()));
    }

    let notification = JobNotification {
        outputs: prediction.output_urls(),
        job_id: prediction.id,
        status: prediction.status,
    };

    let response = match state.engine.handle_notification(&notification).await? {
        PushDisposition::Reconciled(_) => (StatusCode::OK, Json(json!({ "status": "reconciled" }))),
        PushDisposition::Ignored(reason) => {
            let reason = match reason {
                IgnoreReason::NotTerminal => "not_terminal",
                IgnoreReason::UnknownJob => "unknown_job",
            };
            (
                StatusCode::ACCEPTED,
                Json(json!({ "status": "ignored", "reason": reason })),
            )
        }
    };
    Ok(response)
}
