use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fanout_core::error::CoreError;
use fanout_engine::EngineError;
use fanout_store::StoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`EngineError`] for failures raised while starting or
/// reconciling a batch. Implements [`IntoResponse`] to produce consistent
/// JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An error from the fan-out engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A request the handler rejected before reaching the engine.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type ErrorParts = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Engine(engine) => classify_engine_error(engine),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> ErrorParts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> ErrorParts {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// Classify an engine error into an HTTP status, error code, and message.
///
/// - Missing records map to 404, lost conditional writes to 409.
/// - A subject image that cannot be fetched or decoded maps to 400.
/// - Everything else maps to 500 with a sanitized message.
fn classify_engine_error(err: &EngineError) -> ErrorParts {
    match err {
        EngineError::Core(core) => classify_core_error(core),
        EngineError::Store(StoreError::NotFound(id)) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Batch with id {id} not found"),
        ),
        EngineError::Store(store @ StoreError::Conflict { .. }) => {
            (StatusCode::CONFLICT, "CONFLICT", store.to_string())
        }
        EngineError::Asset(asset) => (StatusCode::BAD_REQUEST, "INVALID_ASSET", asset.to_string()),
        other => {
            tracing::error!(error = %other, "Engine error");
            internal()
        }
    }
}
