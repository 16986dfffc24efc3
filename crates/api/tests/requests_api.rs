//! Integration tests for ingest, authorization, and request administration.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{body_json, build_test_app, delete, get, ingest, post_json, put_json};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

async fn request_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM requests")
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_missing_authorization_is_rejected_without_side_effects(pool: PgPool) {
    let app = build_test_app(pool.clone());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/request")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"a":1}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["error"], "Invalid or missing authorization");
    assert_eq!(request_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_wrong_key_is_rejected(pool: PgPool) {
    let app = build_test_app(pool.clone());
    ingest(&app, None, json!({})).await;

    for value in [
        "Bearer wrong-key",
        "test-authorization-key",
        "Basic dXNlcjpwYXNz",
        // The key must match exactly, padding included.
        "Bearer   test-authorization-key  ",
        "Bearer test-authorization-key ",
        "Bearer  test-authorization-key",
        "bearer test-authorization-key",
    ] {
        let request = Request::builder()
            .uri("/api/v1/jobs/next-pending")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value}");
    }

    // Rejected claims must not have touched the queue.
    let pending: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status_id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(pending, 1);
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_ingest_then_read_returns_identical_payload(pool: PgPool) {
    let app = build_test_app(pool);
    let payload = json!({
        "clip": "intro.mp4",
        "frames": [1, 2, 3],
        "options": { "hdr": true, "scale": 0.5, "note": null }
    });

    let (request_id, job_id) = ingest(&app, Some("video"), payload.clone()).await;
    assert!(job_id > 0);

    let response = get(&app, &format!("/api/v1/request/{request_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];

    assert_eq!(data["payload"], payload);
    assert_eq!(data["tag"], "video");
    assert_eq!(data["method"], "POST");
    assert_eq!(data["request_url"], "/api/v1/request?tag=video");
    assert_eq!(data["is_handled"], false);
    assert_eq!(data["is_being_processed"], false);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_ingest_records_origin_headers(pool: PgPool) {
    let app = build_test_app(pool);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/request")
        .header(header::AUTHORIZATION, format!("Bearer {}", common::TEST_KEY))
        .header(header::USER_AGENT, "webhook-sender/2.1")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let json = body_json(get(&app, &format!("/api/v1/request/{id}")).await).await;
    assert_eq!(json["data"]["user_agent"], "webhook-sender/2.1");
    assert_eq!(json["data"]["source_ip"], "203.0.113.7");
    assert_eq!(json["data"]["payload"], json!({}));
    assert_eq!(json["data"]["tag"], serde_json::Value::Null);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_non_json_body_is_rejected(pool: PgPool) {
    let app = build_test_app(pool.clone());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/request")
        .header(header::AUTHORIZATION, format!("Bearer {}", common::TEST_KEY))
        .body(Body::from("name=value&other=1"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    assert_eq!(request_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_blank_tag_is_rejected(pool: PgPool) {
    let app = build_test_app(pool);
    let response = post_json(&app, "/api/v1/request?tag=%20", json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_marking_handled_prevents_claim(pool: PgPool) {
    let app = build_test_app(pool);
    let (request_id, _) = ingest(&app, None, json!({ "n": 1 })).await;

    let response = put_json(
        &app,
        &format!("/api/v1/request/{request_id}"),
        json!({ "is_handled": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["is_handled"], true);

    let response = get(&app, "/api/v1/jobs/next-pending").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_delete_keeps_job_history(pool: PgPool) {
    let app = build_test_app(pool);
    let (request_id, job_id) = ingest(&app, None, json!({})).await;

    let response = delete(&app, &format!("/api/v1/request/{request_id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(&app, &format!("/api/v1/request/{request_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, &format!("/api/v1/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["job"]["request_id"], serde_json::Value::Null);

    let response = delete(&app, &format!("/api/v1/request/{request_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unknown_request_returns_404(pool: PgPool) {
    let app = build_test_app(pool);

    let response = get(&app, "/api/v1/request/999999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Request with id 999999 not found");

    let response = put_json(&app, "/api/v1/request/999999", json!({ "is_handled": true })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
