/// Integration tests for API key and HMAC authentication

use axum::{body::Body, http::{Request, StatusCode}};
use chrono::Utc;
use serde_json::json;
use tarot_api::auth::sign_request;

mod common;
use common::*;

const SECRET: &str = "test-secret";

fn secured_app() -> axum::Router {
    let mut config = test_config();
    config.auth_required = true;
    config.api_key = Some("key-123".to_string());
    config.hmac_secret = Some(SECRET.to_string());
    create_test_app_with(config)
}

fn reading_body() -> Vec<u8> {
    serde_json::to_vec(&json!({"question": "signed", "group_order": ["A", "B", "C"]})).unwrap()
}

fn signed_request(timestamp: i64, signature: Option<String>) -> Request<Body> {
    let body = reading_body();
    let timestamp = timestamp.to_string();
    let signature = signature.unwrap_or_else(|| sign_request(SECRET, "POST", "/reading", &timestamp, &body));
    Request::builder()
        .uri("/reading")
        .method("POST")
        .header("Content-Type", "application/json")
        .header("x-client-id", "tests")
        .header("x-timestamp", timestamp)
        .header("x-signature", signature)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_missing_credentials_are_rejected() {
    let app = secured_app();

    let (status, _, body) = send(&app, post_json("/reading", &json!({"question": "q", "group_order": ["A", "B", "C"]}))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_public_routes_stay_open() {
    let app = secured_app();

    let (health, _, _) = send(&app, get("/health")).await;
    let (cards, _, _) = send(&app, get("/cards")).await;

    assert_eq!(health, StatusCode::OK);
    assert_eq!(cards, StatusCode::OK);
}

#[tokio::test]
async fn test_api_key_is_accepted() {
    let app = secured_app();
    let request = Request::builder()
        .uri("/daily?seed=1")
        .header("x-api-key", "key-123")
        .body(Body::empty())
        .unwrap();

    let (status, _, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_api_key_is_rejected() {
    let app = secured_app();
    let request = Request::builder()
        .uri("/daily")
        .header("x-api-key", "wrong")
        .body(Body::empty())
        .unwrap();

    let (status, _, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_signature_is_accepted() {
    let app = secured_app();

    let (status, _, reading) = send(&app, signed_request(Utc::now().timestamp_millis(), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reading["question"], "signed");
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let app = secured_app();

    let (status, _, _) = send(&app, signed_request(Utc::now().timestamp_millis(), Some("00".repeat(32)))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() {
    let app = secured_app();
    let an_hour_ago = Utc::now().timestamp_millis() - 60 * 60 * 1000;

    let (status, _, _) = send(&app, signed_request(an_hour_ago, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_api_key_falls_back_to_signature() {
    let app = secured_app();
    let mut request = signed_request(Utc::now().timestamp_millis(), None);
    request.headers_mut().insert("x-api-key", "stale-key".parse().unwrap());

    let (status, _, reading) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reading["question"], "signed");
}
