use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::deck::Deck;
use crate::interpret::{
    build_details_prompt, build_interpret_prompt, interpret_local, interpretation_from_llm,
    parse_llm_details,
};
use crate::models::{Interpretation, Reading};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A language model that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    fn model(&self) -> &str;
}

/// Client for the Gemini `generateContent` REST endpoint
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, temperature: f32, max_output_tokens: u32) -> anyhow::Result<Self> {
        info!("Creating Gemini client for model {}", model);
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: GEMINI_BASE_URL.to_string(),
            temperature,
            max_output_tokens,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let request = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            },
        });

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let parts = response["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid response format: missing candidate parts"))?;

        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        Ok(text.trim().to_string())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Interprets a reading with the model, degrading to the local interpreter
///
/// An empty answer or a failed request yields the local interpretation.
#[instrument(skip(generator, reading, deck), fields(reading_id = %reading.get_id(), model = generator.model()))]
pub async fn interpret_with_llm(
    generator: &dyn TextGenerator,
    reading: &Reading,
    lang: &str,
    deck: Option<&Deck>,
) -> Interpretation {
    let prompt = build_interpret_prompt(reading, lang, deck);

    match generator.generate(&prompt).await {
        Ok(text) if !text.trim().is_empty() => interpretation_from_llm(reading, lang, deck, text.trim()),
        Ok(_) => {
            warn!("Model returned an empty answer, using local interpretation");
            interpret_local(reading, lang, deck)
        }
        Err(e) => {
            warn!("Model request failed, using local interpretation: {:#}", e);
            interpret_local(reading, lang, deck)
        }
    }
}

/// One short analysis per drawn card; empty strings when the model fails
#[instrument(skip(generator, reading, deck), fields(reading_id = %reading.get_id()))]
pub async fn explain_cards(
    generator: &dyn TextGenerator,
    reading: &Reading,
    lang: &str,
    deck: Option<&Deck>,
) -> Vec<String> {
    let prompt = build_details_prompt(reading, lang, deck);

    match generator.generate(&prompt).await {
        Ok(text) => parse_llm_details(&text, reading.items.len()),
        Err(e) => {
            warn!("Card detail request failed: {:#}", e);
            vec![String::new(); reading.items.len()]
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::GroupOrder;
    use crate::test_utils::sample_cards;
    use std::sync::Mutex;

    /// Generator returning canned answers and recording prompts
    pub(crate) struct StubGenerator {
        answer: Result<String, String>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl StubGenerator {
        pub(crate) fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                answer: Err("boom".to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().map_err(|e| anyhow::anyhow!(e))
        }

        fn model(&self) -> &str {
            "stub"
        }
    }

    fn reading() -> Reading {
        let items = crate::reading::create_reading(&sample_cards(78), &GroupOrder::ALL, 1, Some(3), true).unwrap();
        Reading::new("Will it work out?".to_string(), GroupOrder::ALL.to_vec(), items)
    }

    #[tokio::test]
    async fn test_interpret_with_llm_uses_json() {
        let stub = StubGenerator::answering(r#"{"summary":"Bright","advices":["a","b","c"]}"#);
        let interp = interpret_with_llm(&stub, &reading(), "en", None).await;
        assert!(interp.llm_used);
        assert_eq!(interp.summary, "Bright");
        assert_eq!(stub.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_interpret_with_llm_falls_back_on_error() {
        let stub = StubGenerator::failing();
        let interp = interpret_with_llm(&stub, &reading(), "ko", None).await;
        assert!(!interp.llm_used);
        assert!(interp.summary.starts_with("흐름 요약"));
    }

    #[tokio::test]
    async fn test_interpret_with_llm_falls_back_on_empty() {
        let stub = StubGenerator::answering("   ");
        let interp = interpret_with_llm(&stub, &reading(), "en", None).await;
        assert!(!interp.llm_used);
    }

    #[tokio::test]
    async fn test_explain_cards() {
        let stub = StubGenerator::answering(r#"["1","2","3","4","5","6","7","8"]"#);
        let details = explain_cards(&stub, &reading(), "en", None).await;
        assert_eq!(details.len(), 8);
        assert_eq!(details[7], "8");

        let failing = StubGenerator::failing();
        let details = explain_cards(&failing, &reading(), "en", None).await;
        assert_eq!(details, vec![String::new(); 8]);
    }
}
