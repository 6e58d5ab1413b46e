use std::sync::Arc;

use fanout_engine::Engine;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Batch fan-out and reconciliation engine.
    pub engine: Arc<Engine>,
}
