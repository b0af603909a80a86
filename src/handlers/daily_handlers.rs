use axum::{Json, extract::State};
use tracing::instrument;

use crate::AppState;
use crate::dto::{DailyQuery, ValidQuery};
use crate::errors::ApiError;
use crate::models::DailyFortune;
use crate::service;

/// Handler for the card of the day
///
/// This function handles GET requests to `/daily?lang=&seed=&use_llm=`.
///
/// ### Returns
///
/// Today's UTC date, one card in context and a short summary
#[instrument(skip(state, query), fields(lang = %query.lang, seed = ?query.seed))]
pub async fn daily_handler(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<DailyQuery>,
) -> Result<Json<DailyFortune>, ApiError> {
    service::daily_fortune(&state, &query.lang, query.seed, query.use_llm).await.map(Json)
}
