use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Largest accepted distance between the signed timestamp and now
pub const MAX_CLOCK_SKEW_MS: i64 = 5 * 60 * 1000;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

/// Byte comparison whose duration does not depend on where the inputs differ
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Path as it takes part in the signature: trailing slash removed, except for `/`
pub fn canonical_path(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// String covered by the request signature
pub fn signing_base(method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    let body_hash = hex::encode(Sha256::digest(body));
    format!(
        "{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        canonical_path(path),
        timestamp,
        body_hash
    )
}

/// Hex HMAC-SHA256 signature for a request
///
/// Clients send the result in `x-signature` together with `x-client-id`
/// and the millisecond `x-timestamp` that was signed.
pub fn sign_request(secret: &str, method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length
        Err(_) => return String::new(),
    };
    mac.update(signing_base(method, path, timestamp, body).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn verify_signature(secret: &str, base: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(base.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

fn timestamp_is_fresh(timestamp: &str, now_ms: i64) -> bool {
    timestamp
        .parse::<i64>()
        .map(|ts| (now_ms - ts).abs() <= MAX_CLOCK_SKEW_MS)
        .unwrap_or(false)
}

/// Middleware guarding the reading, share and daily routes
///
/// Does nothing unless `auth_required` is set. Accepts either a matching
/// `x-api-key` or a valid HMAC signature over the request.
pub async fn require_api_auth(
    State(config): State<Arc<Config>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !config.auth_required {
        return Ok(next.run(req).await);
    }

    if let (Some(expected), Some(given)) = (config.api_key.as_deref(), header(req.headers(), "x-api-key")) {
        if constant_time_eq(expected.as_bytes(), given.as_bytes()) {
            debug!("Authenticated with API key");
            return Ok(next.run(req).await);
        }
        debug!("API key mismatch, trying the signature");
    }

    let Some(secret) = config.hmac_secret.as_deref() else {
        warn!("Rejected unauthenticated request");
        return Err(ApiError::Unauthorized);
    };

    let headers = req.headers();
    let (Some(client_id), Some(timestamp), Some(signature)) = (
        header(headers, "x-client-id"),
        header(headers, "x-timestamp"),
        header(headers, "x-signature"),
    ) else {
        warn!("Rejected request without signature headers");
        return Err(ApiError::Unauthorized);
    };
    let client_id = client_id.to_string();
    let timestamp = timestamp.to_string();
    let signature = signature.to_ascii_lowercase();

    if !timestamp_is_fresh(&timestamp, Utc::now().timestamp_millis()) {
        warn!(client_id = %client_id, "Rejected request with stale timestamp");
        return Err(ApiError::Unauthorized);
    }

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, config.max_body_bytes)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;

    let base = signing_base(parts.method.as_str(), parts.uri.path(), &timestamp, &bytes);
    if !verify_signature(secret, &base, &signature) {
        warn!(client_id = %client_id, "Rejected request with bad signature");
        return Err(ApiError::Unauthorized);
    }

    debug!(client_id = %client_id, "Authenticated with HMAC signature");
    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}
