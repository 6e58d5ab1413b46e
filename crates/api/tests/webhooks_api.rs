//! Integration tests for `/api/v1/webhooks/jobs`.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post, post_json, ready_batch};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: a terminal notification for a submitted job is reconciled
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_notifications_complete_the_batch() {
    let app = build_test_app();
    app.seed(ready_batch("rec1", 2)).await;
    let response = post(app.router.clone(), "/api/v1/batches/rec1/start").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        app.router.clone(),
        "/api/v1/webhooks/jobs",
        json!({
            "id": "job-1",
            "status": "succeeded",
            "output": ["https://cdn.example.com/a.png", "https://cdn.example.com/b.png"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "reconciled");

    let response = post_json(
        app.router.clone(),
        "/api/v1/webhooks/jobs",
        json!({ "id": "job-2", "status": "failed", "error": "NSFW content detected" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get(app.router.clone(), "/api/v1/batches/rec1").await).await;
    let batch = &json["data"];
    assert_eq!(batch["status"], "completed");
    assert_eq!(batch["failed_ids"], json!(["job-2"]));
    assert_eq!(batch["outputs"].as_array().unwrap().len(), 2);
    assert_eq!(batch["outputs"][0]["filename"], "job-1-0.png");
    assert!(batch["completed_at"].is_string());

    app.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: redelivery is acknowledged and changes nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn redelivered_notification_is_reconciled_once() {
    let app = build_test_app();
    app.seed(ready_batch("rec1", 2)).await;
    post(app.router.clone(), "/api/v1/batches/rec1/start").await;

    let payload = json!({
        "id": "job-1",
        "status": "succeeded",
        "output": "https://cdn.example.com/a.webp",
    });
    for _ in 0..3 {
        let response =
            post_json(app.router.clone(), "/api/v1/webhooks/jobs", payload.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let json = body_json(get(app.router.clone(), "/api/v1/batches/rec1").await).await;
    assert_eq!(json["data"]["outputs"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["outputs"][0]["filename"], "job-1-0.webp");
    assert_eq!(json["data"]["status"], "processing");

    app.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: notifications that cannot be applied are acknowledged with 202
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_is_acknowledged_as_ignored() {
    let app = build_test_app();

    let response = post_json(
        app.router.clone(),
        "/api/v1/webhooks/jobs",
        json!({ "id": "never-submitted", "status": "succeeded", "output": [] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ignored");
    assert_eq!(json["reason"], "unknown_job");
}

#[tokio::test]
async fn non_terminal_status_is_acknowledged_as_ignored() {
    let app = build_test_app();
    app.seed(ready_batch("rec1", 1)).await;
    post(app.router.clone(), "/api/v1/batches/rec1/start").await;

    let response = post_json(
        app.router.clone(),
        "/api/v1/webhooks/jobs",
        json!({ "id": "job-1", "status": "processing" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["reason"], "not_terminal");

    let json = body_json(get(app.router.clone(), "/api/v1/batches/rec1").await).await;
    assert_eq!(json["data"]["seen_ids"], json!([]));

    app.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a notification without a job id is rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_job_id_is_rejected() {
    let app = build_test_app();

    let response = post_json(
        app.router.clone(),
        "/api/v1/webhooks/jobs",
        json!({ "id": "  ", "status": "succeeded", "output": [] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}
