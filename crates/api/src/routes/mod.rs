pub mod batches;
pub mod health;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /batches/{id}                   current batch record (GET)
/// /batches/{id}/start             validate, reset and fan out (POST)
///
/// /webhooks/jobs                  job completion notifications (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/batches", batches::router())
        .nest("/webhooks", webhooks::router())
}
