use std::collections::HashSet;

use axum::{
    extract::{FromRequest, FromRequestParts, Json, Query, Request},
    http::{StatusCode, request::Parts},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::errors::{ApiError, FieldError};
use crate::interpret::DEFAULT_STYLE;
use crate::models::GroupOrder;

/// Longest accepted question, in characters
pub const MAX_QUESTION_CHARS: usize = 500;

/// Upper bound on how many times the deck may be shuffled
pub const MAX_SHUFFLE_TIMES: i64 = 50;

/// Languages accepted by interpretation endpoints
pub const REQUEST_LANGS: [&str; 5] = ["ko", "en", "ja", "zh", "auto"];

/// Semantic checks run after a request has been deserialized
pub trait Validate {
    /// Returns every invalid field, or `Ok(())` when the value is acceptable
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

fn default_shuffle_times() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_lang() -> String {
    "ko".to_string()
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

fn validate_lang(loc: &str, lang: &str, errors: &mut Vec<FieldError>) {
    if !REQUEST_LANGS.contains(&lang) {
        errors.push(FieldError::new(
            loc,
            format!("must be one of {}", REQUEST_LANGS.join(", ")),
        ));
    }
}

fn into_result(errors: Vec<FieldError>) -> Result<(), Vec<FieldError>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Data transfer object for drawing a new reading
///
/// This struct is used to deserialize JSON requests for `POST /reading`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReadingRequest {
    /// The question asked of the cards
    pub question: String,

    /// Order in which the three split groups are stacked back together
    pub group_order: Vec<GroupOrder>,

    /// Number of shuffle passes over the merged deck
    #[serde(default = "default_shuffle_times")]
    pub shuffle_times: i64,

    /// Seed for a reproducible draw
    #[serde(default)]
    pub seed: Option<i64>,

    /// Whether cards may come out reversed
    #[serde(default = "default_true")]
    pub allow_reversed: bool,
}

impl ReadingRequest {
    pub fn new(question: impl Into<String>, group_order: Vec<GroupOrder>) -> Self {
        Self {
            question: question.into(),
            group_order,
            shuffle_times: default_shuffle_times(),
            seed: None,
            allow_reversed: true,
        }
    }
}

impl Validate for ReadingRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let chars = self.question.chars().count();
        if chars == 0 || chars > MAX_QUESTION_CHARS {
            errors.push(FieldError::new(
                "body.question",
                format!("must be between 1 and {} characters", MAX_QUESTION_CHARS),
            ));
        }

        let unique: HashSet<GroupOrder> = self.group_order.iter().copied().collect();
        if self.group_order.len() != 3 || unique.len() != 3 {
            errors.push(FieldError::new(
                "body.group_order",
                "must contain A, B and C exactly once",
            ));
        }

        if !(1..=MAX_SHUFFLE_TIMES).contains(&self.shuffle_times) {
            errors.push(FieldError::new(
                "body.shuffle_times",
                format!("must be between 1 and {}", MAX_SHUFFLE_TIMES),
            ));
        }

        into_result(errors)
    }
}

/// Data transfer object for interpreting a stored reading
///
/// This struct is used to deserialize JSON requests for `POST /reading/{id}/interpret`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InterpretRequest {
    /// Output language, or `auto` to detect it from the question
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Interpretation style, part of the cache key
    #[serde(default = "default_style")]
    pub style: String,

    /// Ask the language model instead of the local interpreter
    #[serde(default)]
    pub use_llm: bool,
}

impl Default for InterpretRequest {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            style: default_style(),
            use_llm: false,
        }
    }
}

impl Validate for InterpretRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        validate_lang("body.lang", &self.lang, &mut errors);
        if self.style.trim().is_empty() {
            errors.push(FieldError::new("body.style", "must not be empty"));
        }
        into_result(errors)
    }
}

/// Query parameters of `GET /reading/{id}/result`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResultQuery {
    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default)]
    pub use_llm: bool,
}

impl Validate for ResultQuery {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        validate_lang("query.lang", &self.lang, &mut errors);
        into_result(errors)
    }
}

/// Query parameters of `GET /daily`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DailyQuery {
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Seed for a reproducible card; random when absent
    #[serde(default)]
    pub seed: Option<i64>,

    #[serde(default)]
    pub use_llm: bool,
}

impl Validate for DailyQuery {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        validate_lang("query.lang", &self.lang, &mut errors);
        into_result(errors)
    }
}

/// JSON body extractor that runs [`Validate`] and rejects with the API error envelope
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge
            } else {
                ApiError::invalid("body", rejection.body_text())
            }
        })?;
        value.validate().map_err(ApiError::Validation)?;
        Ok(ValidJson(value))
    }
}

/// Parses an optional JSON body, using the defaults when it is empty
///
/// ### Errors
///
/// Returns a validation error when the body is not valid JSON for `T` or
/// fails [`Validate`]
pub fn parse_optional_json<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value: T = serde_json::from_slice(body).map_err(|e| ApiError::invalid("body", e.to_string()))?;
    value.validate().map_err(ApiError::Validation)?;
    Ok(value)
}

/// Query string extractor that runs [`Validate`] and rejects with the API error envelope
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::invalid("query", rejection.body_text()))?;
        value.validate().map_err(ApiError::Validation)?;
        Ok(ValidQuery(value))
    }
}
