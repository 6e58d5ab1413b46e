//! Route definitions for the `/batches` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// Routes mounted at `/batches`.
///
/// ```text
/// GET    /{id}            -> get_batch
/// POST   /{id}/start      -> start_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(batches::get_batch))
        .route("/{id}/start", post(batches::start_batch))
}
