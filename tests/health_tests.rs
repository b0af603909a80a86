/// Integration tests for the health endpoint and response headers

use axum::{body::Body, http::{Request, StatusCode}};
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn test_health_returns_ok_with_request_id() {
    let app = create_test_app();

    let (status, headers, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
    let request_id = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert!(!request_id.is_empty());
}

#[tokio::test]
async fn test_health_trailing_slash() {
    let app = create_test_app();
    let (status, _, _) = send(&app, get("/health/")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_incoming_request_id_is_echoed() {
    let app = create_test_app();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me-123")
        .body(Body::empty())
        .unwrap();

    let (_, headers, _) = send(&app, request).await;

    assert_eq!(headers.get("x-request-id").unwrap(), "trace-me-123");
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let app = create_test_app();

    let (_, headers, _) = send(&app, get("/health")).await;

    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-xss-protection").unwrap(), "0");
}
