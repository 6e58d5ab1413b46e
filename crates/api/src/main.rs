use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fanout_engine::Engine;
use fanout_jobs::{HttpAssetEncoder, PredictionApi};
use fanout_store::{HttpRecordStore, InMemoryRecordStore, RecordStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fanout_api::config::ServerConfig;
use fanout_api::router::build_app_router;
use fanout_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fanout_api=debug,fanout_engine=debug,fanout_store=info,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Record store ---
    let store: Arc<dyn RecordStore> = match &config.record_store_url {
        Some(url) => {
            tracing::info!(url = %url, "Using HTTP record store");
            Arc::new(HttpRecordStore::new(
                url.clone(),
                config.record_store_token.clone(),
            ))
        }
        None => {
            tracing::warn!("RECORD_STORE_URL not set, using in-memory record store");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    // --- Job service ---
    if config.job_service_model.is_empty() {
        tracing::warn!("JOB_SERVICE_MODEL is empty; job submissions will likely be rejected");
    }
    let jobs = Arc::new(PredictionApi::new(
        config.job_service_url.clone(),
        config.job_service_token.clone(),
        config.job_service_model.clone(),
    ));

    // --- Engine ---
    let engine_config = config.engine_config();
    tracing::info!(
        poll_interval_secs = engine_config.poll_interval.as_secs(),
        poll_deadline_secs = engine_config.poll_deadline.as_secs(),
        notify_url = engine_config.notify_url.as_deref(),
        "Starting fan-out engine",
    );
    let engine = Arc::new(Engine::new(
        store,
        jobs,
        Arc::new(HttpAssetEncoder::new()),
        engine_config,
    ));

    if config.recover_on_startup {
        match engine.recover_in_flight().await {
            Ok(summary) => tracing::info!(
                batches = summary.batches,
                pollers = summary.pollers,
                "Startup recovery finished",
            ),
            Err(e) => tracing::error!(error = %e, "Startup recovery failed; continuing"),
        }
    }

    // --- App state ---
    let state = AppState {
        engine: Arc::clone(&engine),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Unfinished jobs are picked up by startup recovery on the next boot.
    engine
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
