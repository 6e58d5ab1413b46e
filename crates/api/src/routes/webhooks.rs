//! Route definitions for inbound webhooks.
//!
//! These are called by the job service, not by users.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /jobs            -> receive_job_notification
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/jobs", post(webhooks::receive_job_notification))
}
