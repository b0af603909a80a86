use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use crate::AppState;
use crate::errors::ApiError;
use crate::models::{Card, CardsResponse};

/// Whether an `If-None-Match` header already names the current ETag
fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == etag || candidate.trim_start_matches("W/") == etag.trim_start_matches("W/"))
}

/// Handler for listing the card catalogue
///
/// This function handles GET requests to `/cards`. The response carries a
/// weak ETag; a matching `If-None-Match` yields `304 Not Modified`.
///
/// ### Arguments
///
/// * `state` - The application state
/// * `headers` - Request headers, checked for `If-None-Match`
///
/// ### Returns
///
/// `{total, items}` with every card ordered by id
#[instrument(skip(state, headers))]
pub async fn list_cards_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let etag = state.cards.catalogue_etag()?;
    let etag_value = HeaderValue::from_str(&etag).map_err(|e| anyhow::anyhow!("Invalid ETag: {}", e))?;

    if etag_matches(&headers, &etag) {
        debug!("Card list not modified");
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag_value)]).into_response());
    }

    let cards = state.cards.list_cards()?;

    debug!("Listing {} cards", cards.len());
    let body = CardsResponse {
        total: cards.len(),
        items: cards,
    };
    Ok(([(header::ETAG, etag_value)], Json(body)).into_response())
}

/// Handler for retrieving a specific card
///
/// This function handles GET requests to `/cards/{id}`.
///
/// ### Arguments
///
/// * `state` - The application state
/// * `id` - The numeric ID of the card, extracted from the URL path
///
/// ### Returns
///
/// The requested card as JSON
///
/// ### Errors
///
/// `422` when the id is not an integer, `404` when no card has it
#[instrument(skip(state), fields(card_id = %id))]
pub async fn get_card_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Card>, ApiError> {
    let id: i32 = id
        .trim()
        .parse()
        .map_err(|_| ApiError::invalid("path.card_id", "must be an integer"))?;

    state
        .cards
        .get_card(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))
}
