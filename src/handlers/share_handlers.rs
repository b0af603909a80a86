use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use crate::AppState;
use crate::errors::ApiError;
use crate::models::{Reading, ShareLink};
use crate::service;

/// Handler for sharing a reading
///
/// This function handles POST requests to `/reading/{id}/share`. Calling it
/// again returns the same slug.
///
/// ### Returns
///
/// `{id, slug, path}` where `path` is the public `/share/{slug}` URL path
#[instrument(skip(state), fields(reading_id = %id))]
pub async fn create_share_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ShareLink>, ApiError> {
    service::share_reading(&state, &id).map(Json)
}

/// Handler for opening a shared reading
///
/// This function handles GET requests to `/share/{slug}`.
///
/// ### Errors
///
/// `404` when the slug is unknown
#[instrument(skip(state), fields(slug = %slug))]
pub async fn resolve_share_handler(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Reading>, ApiError> {
    service::resolve_share(&state, &slug).map(Json)
}
