//! Common test utilities for Tarot API integration tests
//!
//! This file contains the test application setup over the bundled dataset,
//! request builders and a helper that sends a request and decodes the JSON
//! response.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode},
};
use serde_json::Value;
use tarot_api::{
    AppState,
    config::{Config, base_config},
    create_app,
    deck::{Deck, DeckOptions},
    repo::{FileCardRepository, MemoryReadingRepository},
};
use tower::ServiceExt;

/// Path of a file under the crate root
pub fn project_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

/// Local configuration over the bundled dataset with generous rate limits
pub fn test_config() -> Config {
    let mut config = base_config();
    config.data_path = project_path("data/tarot-images.json");
    config.static_dir = project_path("static");
    config.rate_limit_default = "1000/minute".to_string();
    config.rate_limit_health = "1000/second".to_string();
    config.rate_limit_cards = "1000/minute".to_string();
    config.rate_limit_reading_post = "1000/minute".to_string();
    config
}

/// Creates a test application from the given configuration
///
/// Cards come from the dataset file and readings live in memory, so every
/// call returns an isolated application.
pub fn create_test_app_with(config: Config) -> Router {
    let options = DeckOptions {
        data_path: config.data_path.clone(),
        meanings_path: config.meanings_path.clone(),
        static_dir: config.static_dir.clone(),
        prefer_local_images: config.prefer_local_images,
    };
    let deck = Arc::new(Deck::load(&options).unwrap());
    let state = AppState::new(
        config,
        deck.clone(),
        Arc::new(FileCardRepository::new(deck)),
        Arc::new(MemoryReadingRepository::new()),
        None,
    )
    .unwrap();
    create_app(state)
}

pub fn create_test_app() -> Router {
    create_test_app_with(test_config())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Sends a request and returns the status, headers and JSON body
///
/// Empty bodies (such as 304 responses) decode to `Value::Null`.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

/// Creates a reading via the API and returns its JSON body
pub async fn create_reading(app: &Router, body: &Value) -> Value {
    let (status, _, reading) = send(app, post_json("/reading", body)).await;
    assert_eq!(status, StatusCode::OK, "unexpected response: {}", reading);
    reading
}
