//! Tarot API: tarot card data and eight-card readings over HTTP
//!
//! This library provides the card catalogue, the reading ritual, local and
//! LLM-backed interpretations, and the axum router that serves them.
//!
//! ### Modules
//!
//! - `config`: Layered configuration (defaults, TOML file, environment and flags)
//! - `deck`: Card dataset loading, meanings and the catalogue ETag
//! - `reading`: Split, merge, shuffle and draw
//! - `interpret` / `llm`: Local and Gemini-backed interpretations
//! - `repo`: File, in-memory and Postgres storage
//! - `service`: Operations shared by the handlers
//! - `sync`: Offline dataset and image cache tooling
//!
//! ### Web API
//!
//! - `GET /health`: Liveness check
//! - `GET /cards`, `GET /cards/{id}`: Card catalogue
//! - `POST /reading`: Draw a new reading
//! - `GET /reading/{id}`, `GET /reading/{id}/result`: Stored readings
//! - `POST /reading/{id}/interpret`, `POST /reading/{id}/share`
//! - `GET /share/{slug}`: Reading behind a share link
//! - `GET /daily`: Card of the day

/// Request authentication
pub mod auth;

/// Configuration module
pub mod config;

/// Database connection module
pub mod db;

/// Card dataset module
pub mod deck;

/// Request and query bodies
pub mod dto;

/// API error type and envelope
pub mod errors;

/// HTTP handlers
pub mod handlers;

/// Local interpretation and prompt building
pub mod interpret;

/// Language model client
pub mod llm;

/// Logging setup
pub mod logging;

/// Request id, body limit and access log middleware
pub mod middleware;

/// Data models module
pub mod models;

/// Per-client rate limiting
pub mod rate_limit;

/// Reading ritual
pub mod reading;

/// Repository module for card and reading storage
pub mod repo;

/// Database schema module
pub mod schema;

/// Operations shared by the handlers
pub mod service;

/// Offline dataset and image tooling
pub mod sync;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
};

use crate::config::{Config, ConfigError, RateLimits};
use crate::deck::Deck;
use crate::errors::ApiError;
use crate::llm::TextGenerator;
use crate::rate_limit::{RateLimiter, RouteLimit, enforce_rate_limit};
use crate::repo::{CardRepository, ReadingRepository};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub deck: Arc<Deck>,
    pub cards: Arc<dyn CardRepository>,
    pub readings: Arc<dyn ReadingRepository>,
    /// Present only when an LLM key is configured
    pub llm: Option<Arc<dyn TextGenerator>>,
    pub limiter: Arc<RateLimiter>,
    pub limits: RateLimits,
}

impl AppState {
    /// Bundles the shared services, parsing the configured rate limits
    ///
    /// ### Errors
    ///
    /// Returns an error if a `RATE_LIMIT_*` value cannot be parsed
    pub fn new(
        config: Config,
        deck: Arc<Deck>,
        cards: Arc<dyn CardRepository>,
        readings: Arc<dyn ReadingRepository>,
        llm: Option<Arc<dyn TextGenerator>>,
    ) -> Result<Self, ConfigError> {
        let limits = config.rate_limits()?;
        Ok(Self {
            config: Arc::new(config),
            deck,
            cards,
            readings,
            llm,
            limiter: Arc::new(RateLimiter::new()),
            limits,
        })
    }

    fn route_limit(&self, scope: &'static str) -> RouteLimit {
        let rule = match scope {
            "health" => &self.limits.health,
            "cards" => &self.limits.cards,
            "reading_post" => &self.limits.reading_post,
            _ => &self.limits.default,
        };
        RouteLimit {
            limiter: self.limiter.clone(),
            scope,
            rule: rule.clone(),
        }
    }
}

/// CORS policy: the configured origins with credentials, or anything when none are set
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

async fn not_found_fallback() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

async fn method_not_allowed_fallback() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Creates the application router with all routes
///
/// Each group of routes carries its own rate limit scope; reading, share and
/// daily routes also require authentication when it is enabled.
///
/// ### Arguments
///
/// * `state` - The shared services handed to every handler
///
/// ### Returns
///
/// An Axum Router configured with all routes, middleware and static files
pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();
    let auth = from_fn_with_state(config.clone(), auth::require_api_auth);

    let health = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/health/", get(handlers::health_handler))
        .route_layer(from_fn_with_state(state.route_limit("health"), enforce_rate_limit));

    let cards = Router::new()
        .route("/cards", get(handlers::list_cards_handler))
        .route("/cards/", get(handlers::list_cards_handler))
        .route("/cards/{id}", get(handlers::get_card_handler))
        .route_layer(from_fn_with_state(state.route_limit("cards"), enforce_rate_limit));

    let reading_post = Router::new()
        .route("/reading", post(handlers::create_reading_handler))
        .route("/reading/", post(handlers::create_reading_handler))
        .route_layer(auth.clone())
        .route_layer(from_fn_with_state(state.route_limit("reading_post"), enforce_rate_limit));

    let default = Router::new()
        .route("/reading/{id}", get(handlers::get_reading_handler))
        .route("/reading/{id}/result", get(handlers::get_result_handler))
        .route("/reading/{id}/interpret", post(handlers::interpret_handler))
        .route("/reading/{id}/share", post(handlers::create_share_handler))
        .route("/share/{slug}", get(handlers::resolve_share_handler))
        .route("/daily", get(handlers::daily_handler))
        .route("/daily/", get(handlers::daily_handler))
        .route_layer(auth)
        .route_layer(from_fn_with_state(state.route_limit("default"), enforce_rate_limit));

    Router::new()
        .merge(health)
        .merge(cards)
        .merge(reading_post)
        .merge(default)
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .fallback(not_found_fallback)
        .method_not_allowed_fallback(method_not_allowed_fallback)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("0"),
        ))
        .layer(from_fn_with_state(config.max_body_bytes, middleware::request_context))
}

/// Runs the embedded migrations
///
/// ### Arguments
///
/// * `conn` - A mutable reference to a Postgres connection
///
/// ### Errors
///
/// Returns an error if a pending migration fails to apply
pub fn run_migrations(conn: &mut diesel::PgConnection) -> anyhow::Result<()> {
    use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    Ok(())
}

