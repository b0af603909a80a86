use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::errors::{ApiError, REQUEST_ID};
use crate::rate_limit::client_addr;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request id supplied by the caller, or a fresh UUID
fn request_id_of(req: &Request) -> String {
    req.headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn declared_length(req: &Request) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Outermost middleware: request id, body size guard and the access log
///
/// The request id is available to everything downstream through
/// [`crate::errors::current_request_id`] and is echoed in `x-request-id`.
pub async fn request_context(State(max_body_bytes): State<usize>, req: Request, next: Next) -> Response {
    let request_id = request_id_of(&req);
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client = client_addr(&req);
    let started = Instant::now();

    let span = info_span!("request", request_id = %request_id, method = %method, path = %path);

    let mut response = REQUEST_ID
        .scope(
            request_id.clone(),
            async move {
                match declared_length(&req) {
                    Some(length) if length > max_body_bytes => {
                        warn!(length, max_body_bytes, "Rejecting oversized request body");
                        ApiError::PayloadTooLarge.into_response()
                    }
                    _ => next.run(req).await,
                }
            }
            .instrument(span),
        )
        .await;

    let status = response.status().as_u16();
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    info!(
        request_id = %request_id,
        client_ip = %client,
        status,
        duration_ms,
        "HTTP {} {} {} {:.1}ms",
        method,
        path,
        status,
        duration_ms
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}
