use axum::Json;
use serde_json::{Value, json};
use tracing::instrument;

/// Handler for the liveness check
///
/// This function handles GET requests to `/health`.
///
/// ### Returns
///
/// `{"status": "ok"}`
#[instrument]
pub async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
