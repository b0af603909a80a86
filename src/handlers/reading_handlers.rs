use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use tracing::{info, instrument};

use crate::AppState;
use crate::dto::{InterpretRequest, ReadingRequest, ResultQuery, ValidJson, ValidQuery, parse_optional_json};
use crate::errors::ApiError;
use crate::models::{FullReadingResult, Interpretation, Reading};
use crate::service;

/// Handler for drawing a new reading
///
/// This function handles POST requests to `/reading`.
///
/// ### Arguments
///
/// * `state` - The application state
/// * `payload` - The validated reading request
///
/// ### Returns
///
/// The stored reading, including its new `id`
#[instrument(skip(state, payload), fields(question_chars = payload.question.chars().count()))]
pub async fn create_reading_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ReadingRequest>,
) -> Result<Json<Reading>, ApiError> {
    let reading = service::create_and_save_reading(&state, &payload).await?;
    info!("Drew reading {}", reading.get_id());
    Ok(Json(reading))
}

/// Handler for retrieving a stored reading
///
/// This function handles GET requests to `/reading/{id}`.
///
/// ### Errors
///
/// `404` when no reading has the given id
#[instrument(skip(state), fields(reading_id = %id))]
pub async fn get_reading_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Reading>, ApiError> {
    service::get_reading(&state, &id).map(Json)
}

/// Handler for the full result of a reading
///
/// This function handles GET requests to `/reading/{id}/result?lang=&use_llm=`.
///
/// ### Returns
///
/// Cards with their roles and meanings, plus the (cached) interpretation
#[instrument(skip(state, query), fields(reading_id = %id, lang = %query.lang, use_llm = query.use_llm))]
pub async fn get_result_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidQuery(query): ValidQuery<ResultQuery>,
) -> Result<Json<FullReadingResult>, ApiError> {
    service::get_full_result(&state, &id, &query.lang, query.use_llm).await.map(Json)
}

/// Handler for interpreting a reading
///
/// This function handles POST requests to `/reading/{id}/interpret`. An
/// empty body interprets in Korean with the local interpreter.
#[instrument(skip(state, body), fields(reading_id = %id))]
pub async fn interpret_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Interpretation>, ApiError> {
    let request: InterpretRequest = parse_optional_json(&body)?;
    service::interpret_and_cache(&state, &id, &request).await.map(Json)
}
