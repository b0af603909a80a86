//! Operations shared by the HTTP handlers
//!
//! Handlers parse and validate requests; everything that touches the
//! repositories, the deck or the language model goes through here.

use anyhow::Context;
use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::AppState;
use crate::dto::{InterpretRequest, ReadingRequest};
use crate::errors::ApiError;
use crate::interpret::{DEFAULT_STYLE, interpret_local, meanings_of, resolve_lang, role_for};
use crate::llm::{TextGenerator, explain_cards, interpret_with_llm};
use crate::models::{CardWithContext, DailyFortune, DrawnCard, FullReadingResult, Interpretation, Reading, ShareLink};
use crate::reading::{create_reading, rng_from_seed};

/// Question used for the daily fortune
pub const DAILY_QUESTION: &str = "오늘의 총운";

/// Number of meanings shown next to each card
const USED_MEANINGS: usize = 3;

fn reading_not_found() -> ApiError {
    ApiError::NotFound("Reading not found".to_string())
}

/// The configured generator, only when the caller asked for it
fn generator_for(state: &AppState, use_llm: bool) -> Option<&dyn TextGenerator> {
    if use_llm { state.llm.as_deref() } else { None }
}

fn with_context(state: &AppState, item: &DrawnCard, lang: &str) -> CardWithContext {
    let used_meanings = meanings_of(item, Some(state.deck.as_ref()), lang).map(|m| m.iter().take(USED_MEANINGS).cloned().collect());
    CardWithContext {
        position: item.position,
        role: role_for(lang, item.position).to_string(),
        is_reversed: item.is_reversed,
        used_meanings,
        card: item.card.clone(),
        llm_detail: None,
    }
}

async fn interpret(state: &AppState, reading: &Reading, lang: &str, use_llm: bool) -> Interpretation {
    match generator_for(state, use_llm) {
        Some(generator) => interpret_with_llm(generator, reading, lang, Some(state.deck.as_ref())).await,
        None => interpret_local(reading, lang, Some(state.deck.as_ref())),
    }
}

/// Draws a reading, stores it and gives it a share slug
///
/// A failure to create the slug is logged and does not fail the request.
#[instrument(skip(state, request), fields(shuffle_times = request.shuffle_times, seeded = request.seed.is_some()))]
pub async fn create_and_save_reading(state: &AppState, request: &ReadingRequest) -> Result<Reading, ApiError> {
    let cards = state.cards.list_cards()?;
    let shuffle_times = u32::try_from(request.shuffle_times).unwrap_or(1);
    let items = create_reading(&cards, &request.group_order, shuffle_times, request.seed, request.allow_reversed)
        .context("Failed to draw cards")?;

    let reading = Reading::new(request.question.clone(), request.group_order.clone(), items);
    let saved = state.readings.create(reading)?;
    let id = saved.get_id();
    info!("Created reading {}", id);

    match state.readings.create_share_slug(&id) {
        Ok(slug) => debug!("Reading {} shared as {}", id, slug),
        Err(e) => warn!("Failed to create share slug for {}: {:#}", id, e),
    }
    Ok(saved)
}

/// Loads a stored reading or fails with 404
pub fn get_reading(state: &AppState, id: &str) -> Result<Reading, ApiError> {
    state.readings.get(id)?.ok_or_else(reading_not_found)
}

/// Interprets a stored reading, using the cache when possible
///
/// The LLM is only used when requested and a key is configured; the cache
/// entry is keyed by what was actually used.
#[instrument(skip(state, request), fields(lang = %request.lang, style = %request.style, use_llm = request.use_llm))]
pub async fn interpret_and_cache(state: &AppState, id: &str, request: &InterpretRequest) -> Result<Interpretation, ApiError> {
    let reading = get_reading(state, id)?;
    let use_llm = request.use_llm && state.llm.is_some();
    let lang = resolve_lang(&request.lang, &reading.question);

    if let Some(cached) = state.readings.get_interpretation(id, &lang, &request.style, use_llm)? {
        debug!("Interpretation cache hit");
        return Ok(cached);
    }

    let interpretation = interpret(state, &reading, &lang, use_llm).await;
    state.readings.save_interpretation(&interpretation, &lang, &request.style, use_llm)?;
    Ok(interpretation)
}

/// Per-card LLM analyses, cached per reading and language
async fn card_details(state: &AppState, generator: &dyn TextGenerator, reading: &Reading, lang: &str) -> Result<Vec<String>, ApiError> {
    let id = reading.get_id();
    if let Some(cached) = state.readings.get_details(&id, lang, true)? {
        return Ok(cached);
    }

    let details = explain_cards(generator, reading, lang, Some(state.deck.as_ref())).await;
    if details.iter().any(|d| !d.is_empty()) {
        state.readings.save_details(&id, lang, true, &details)?;
    }
    Ok(details)
}

/// Everything the result page needs for one reading
#[instrument(skip(state))]
pub async fn get_full_result(state: &AppState, id: &str, lang: &str, use_llm: bool) -> Result<FullReadingResult, ApiError> {
    let reading = get_reading(state, id)?;
    let lang = resolve_lang(lang, &reading.question);
    let use_llm = use_llm && state.llm.is_some();

    let mut items: Vec<CardWithContext> = reading.items.iter().map(|item| with_context(state, item, &lang)).collect();

    let interpretation = match state.readings.get_interpretation(id, &lang, DEFAULT_STYLE, use_llm)? {
        Some(cached) => cached,
        None => {
            let fresh = interpret(state, &reading, &lang, use_llm).await;
            state.readings.save_interpretation(&fresh, &lang, DEFAULT_STYLE, use_llm)?;
            fresh
        }
    };

    if let Some(generator) = generator_for(state, use_llm) {
        let details = card_details(state, generator, &reading, &lang).await?;
        for (item, detail) in items.iter_mut().zip(details) {
            if !detail.is_empty() {
                item.llm_detail = Some(detail);
            }
        }
    }

    Ok(FullReadingResult {
        id: id.to_string(),
        question: reading.question,
        lang,
        items,
        summary: interpretation.summary,
        advices: interpretation.advices,
        llm_used: interpretation.llm_used,
        sections: interpretation.sections,
    })
}

/// One card for today
///
/// With a seed the card and its orientation are reproducible.
#[instrument(skip(state))]
pub async fn daily_fortune(state: &AppState, lang: &str, seed: Option<i64>, use_llm: bool) -> Result<DailyFortune, ApiError> {
    let cards = state.cards.list_cards()?;
    if cards.is_empty() {
        return Err(anyhow::anyhow!("No cards available for the daily fortune").into());
    }

    let mut rng = rng_from_seed(seed);
    let card = cards[rng.random_range(0..cards.len())].clone();
    let is_reversed = rng.random_range(0..=1) == 1;

    let lang = resolve_lang(lang, DAILY_QUESTION);
    let item = DrawnCard {
        position: 1,
        is_reversed,
        card,
    };
    let context = with_context(state, &item, &lang);
    let reading = Reading::new(DAILY_QUESTION.to_string(), Vec::new(), vec![item]);

    let interpretation = interpret(state, &reading, &lang, use_llm).await;

    Ok(DailyFortune {
        date: Utc::now().date_naive().to_string(),
        lang,
        card: context,
        summary: interpretation.summary,
        llm_used: interpretation.llm_used,
    })
}

/// Returns the share link of a reading, creating it on first use
#[instrument(skip(state))]
pub fn share_reading(state: &AppState, id: &str) -> Result<ShareLink, ApiError> {
    get_reading(state, id)?;
    let slug = state.readings.create_share_slug(id)?;
    Ok(ShareLink::new(id.to_string(), slug))
}

/// Loads the reading a share slug points to
#[instrument(skip(state))]
pub fn resolve_share(state: &AppState, slug: &str) -> Result<Reading, ApiError> {
    let id = state
        .readings
        .resolve_share_slug(slug)?
        .ok_or_else(|| ApiError::NotFound("Share link not found".to_string()))?;
    get_reading(state, &id)
}

#[cfg(test)]
mod tests;
