#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use fanout_core::batch::Batch;
use fanout_core::job_status::UpstreamStatus;
use fanout_engine::{Engine, EngineConfig};
use fanout_jobs::{
    AssetEncoder, AssetError, JobService, JobServiceError, JobSpec, JobStatusReport,
};
use fanout_store::InMemoryRecordStore;
use http_body_util::BodyExt;
use tower::ServiceExt;

use fanout_api::config::ServerConfig;
use fanout_api::router::build_app_router;
use fanout_api::state::AppState;

/// Job service whose jobs never finish on their own; completion arrives
/// through the webhook in these tests.
pub struct PendingJobs {
    submissions: AtomicUsize,
}

#[async_trait]
impl JobService for PendingJobs {
    async fn submit(
        &self,
        _spec: &JobSpec,
        _notify_target: Option<&str>,
    ) -> Result<String, JobServiceError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("job-{n}"))
    }

    async fn get_status(&self, _job_id: &str) -> Result<JobStatusReport, JobServiceError> {
        Ok(JobStatusReport {
            status: UpstreamStatus::Processing,
            raw_status: "processing".into(),
            outputs: vec![],
            error: None,
        })
    }
}

pub struct InlineAssets;

#[async_trait]
impl AssetEncoder for InlineAssets {
    async fn encode(&self, reference: &str) -> Result<String, AssetError> {
        if reference.ends_with(".txt") {
            return Err(AssetError::UnsupportedFormat(reference.to_string()));
        }
        Ok("data:image/png;base64,iVBORw0KGgo=".into())
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
        public_base_url: "http://localhost:3000".to_string(),
        job_service_url: "http://jobs.invalid".to_string(),
        job_service_token: String::new(),
        job_service_model: String::new(),
        record_store_url: None,
        record_store_token: String::new(),
        poll_interval_secs: 7,
        poll_deadline_secs: 1200,
        submit_pacing_ms: 1,
        recover_on_startup: false,
    }
}

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<Engine>,
    pub store: Arc<InMemoryRecordStore>,
}

/// Build the full application router with all middleware layers over an
/// in-memory store.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(InMemoryRecordStore::new());
    let engine_config = EngineConfig {
        poll_interval: Duration::from_millis(50),
        submit_pacing: Duration::from_millis(1),
        ..config.engine_config()
    };
    let engine = Arc::new(Engine::new(
        store.clone(),
        Arc::new(PendingJobs {
            submissions: AtomicUsize::new(0),
        }),
        Arc::new(InlineAssets),
        engine_config,
    ));

    let state = AppState {
        engine: Arc::clone(&engine),
    };

    TestApp {
        router: build_app_router(state, &config),
        engine,
        store,
    }
}

impl TestApp {
    pub async fn seed(&self, batch: Batch) {
        self.store.insert(batch).await;
    }

    pub async fn shutdown(&self) {
        self.engine.shutdown(Duration::from_secs(1)).await;
    }
}

pub fn ready_batch(id: &str, fanout: i64) -> Batch {
    let mut batch = Batch::new(id);
    batch.prompt = Some("a quiet harbour at dawn".into());
    batch.subject_image_ref = Some("https://files.example.com/subject.png".into());
    batch.requested_fanout = Some(fanout);
    batch
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
