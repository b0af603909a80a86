use serde::Serialize;
use serde_json::Value;

use crate::deck::Deck;
use crate::models::{DrawnCard, Interpretation, Reading, Sections};

/// Cache key style used for full results
pub const DEFAULT_STYLE: &str = "concise";

/// Languages accepted by the interpretation endpoints, besides `auto`
pub const SUPPORTED_LANGS: [&str; 4] = ["ko", "en", "ja", "zh"];

const ROLES_KO: [&str; 8] = ["이슈", "숨은 영향", "과거", "현재", "근미래", "내면", "외부", "솔루션"];
const ROLES_EN: [&str; 8] = [
    "Issue",
    "Hidden Influence",
    "Past",
    "Present",
    "Near Future",
    "Inner",
    "Outer",
    "Solution",
];
const ROLES_JA: [&str; 8] = ["課題", "潜在的影響", "過去", "現在", "近未来", "内面", "外部", "ソリューション"];
const ROLES_ZH: [&str; 8] = ["议题", "潜在影响", "过去", "现在", "近未来", "内在", "外在", "解决方案"];

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30ff}').contains(&c)
}

fn is_hangul(c: char) -> bool {
    ('\u{ac00}'..='\u{d7af}').contains(&c)
}

/// Guesses the language of a question from its script
pub fn detect_lang(text: &str) -> &'static str {
    if text.is_empty() {
        return "ko";
    }
    if text.chars().any(is_kana) {
        return "ja";
    }
    let has_hangul = text.chars().any(is_hangul);
    if text.chars().any(|c| c.is_ascii_alphabetic()) && !has_hangul {
        return "en";
    }
    if has_hangul {
        return "ko";
    }
    "en"
}

/// Resolves `auto` against the question, passing other codes through
pub fn resolve_lang(requested: &str, question: &str) -> String {
    if requested.eq_ignore_ascii_case("auto") {
        detect_lang(question).to_string()
    } else {
        requested.to_lowercase()
    }
}

/// Role names for positions 1 to 8 in the given language
pub fn role_map(lang: &str) -> &'static [&'static str; 8] {
    let lang = lang.to_lowercase();
    if lang.starts_with("zh") {
        return &ROLES_ZH;
    }
    match lang.as_str() {
        "ko" => &ROLES_KO,
        "ja" => &ROLES_JA,
        _ => &ROLES_EN,
    }
}

/// Role of a 1-based position, empty when out of range
pub fn role_for(lang: &str, position: i32) -> &'static str {
    usize::try_from(position - 1)
        .ok()
        .and_then(|idx| role_map(lang).get(idx))
        .copied()
        .unwrap_or("")
}

/// Meanings used for a drawn card: the deck's localized ones first, then the card's own
pub fn meanings_of<'a>(item: &'a DrawnCard, deck: Option<&'a Deck>, lang: &str) -> Option<&'a [String]> {
    deck.and_then(|d| d.meanings(item.card.get_id(), lang, item.is_reversed))
        .or_else(|| item.card.meanings_for(item.is_reversed))
        .filter(|m| !m.is_empty())
}

/// Wording used by the local interpreter
struct Phrasebook {
    upright: &'static str,
    reversed: &'static str,
    solution: fn(&str) -> String,
    support: fn(&str) -> String,
    summary: &'static str,
}

fn solution_ko(meaning: &str) -> String {
    format!("솔루션: {}을(를) 오늘 작은 실행으로 시작하세요.", meaning)
}

fn support_ko(meaning: &str) -> String {
    format!("보조: {} 관점에서 한 가지 실험을 추가하세요.", meaning)
}

fn solution_en(meaning: &str) -> String {
    format!("Solution: start with {} today through one small action.", meaning)
}

fn support_en(meaning: &str) -> String {
    format!("Support: add one experiment from the angle of {}.", meaning)
}

const PHRASES_KO: Phrasebook = Phrasebook {
    upright: "정",
    reversed: "역",
    solution: solution_ko,
    support: support_ko,
    summary: "흐름 요약: 8번 솔루션을 중심으로 현재 상황과 내외부 요인을 연결해 작게 시작하고, 반복적으로 보완하세요. 단정하지 말고 가설로 접근하세요.",
};

const PHRASES_EN: Phrasebook = Phrasebook {
    upright: "upright",
    reversed: "reversed",
    solution: solution_en,
    support: support_en,
    summary: "Flow summary: center on the Solution card in position 8, connect it to the present situation and the inner and outer factors, start small and refine as you go. Treat this as a hypothesis, not a verdict.",
};

fn phrasebook(lang: &str) -> &'static Phrasebook {
    if lang == "ko" { &PHRASES_KO } else { &PHRASES_EN }
}

/// Position lines plus up to three advices for a reading
fn lines_and_advices(reading: &Reading, lang: &str, deck: Option<&Deck>) -> (Vec<String>, Vec<String>) {
    let phrases = phrasebook(lang);
    let mut lines = Vec::with_capacity(reading.items.len());
    let mut advices = Vec::new();

    for item in &reading.items {
        let meanings = meanings_of(item, deck, lang);
        let top = meanings
            .map(|m| m.iter().take(2).cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        let orientation = if item.is_reversed { phrases.reversed } else { phrases.upright };

        lines.push(format!(
            "{}. {}: {} ({}) - {}",
            item.position,
            role_for(lang, item.position),
            item.card.get_name(),
            orientation,
            top
        ));

        if item.position == 8 {
            if let Some(first) = meanings.and_then(|m| m.first()) {
                advices.push((phrases.solution)(first));
            }
        }
    }

    for item in &reading.items {
        if advices.len() >= 3 {
            break;
        }
        if let Some(first) = meanings_of(item, deck, lang).and_then(|m| m.first()) {
            advices.push((phrases.support)(first));
        }
    }
    advices.truncate(3);

    (lines, advices)
}

/// Deterministic interpretation built from the card meanings alone
pub fn interpret_local(reading: &Reading, lang: &str, deck: Option<&Deck>) -> Interpretation {
    let (positions, advices) = lines_and_advices(reading, lang, deck);
    Interpretation {
        id: reading.get_id(),
        lang: lang.to_string(),
        summary: phrasebook(lang).summary.to_string(),
        positions,
        advices,
        llm_used: false,
        sections: None,
    }
}

#[derive(Serialize)]
struct CardContext<'a> {
    position: i32,
    role: &'static str,
    name: &'a str,
    arcana: &'a str,
    orientation: &'static str,
    meanings: &'a [String],
}

fn card_contexts<'a>(reading: &'a Reading, lang: &str, deck: Option<&'a Deck>) -> Vec<CardContext<'a>> {
    reading
        .items
        .iter()
        .map(|item| CardContext {
            position: item.position,
            role: role_for(lang, item.position),
            name: item.card.get_name(),
            arcana: item.card.get_arcana(),
            orientation: if item.is_reversed { "reversed" } else { "upright" },
            meanings: meanings_of(item, deck, lang).unwrap_or(&[]),
        })
        .collect()
}

/// Prompt asking the model for a strict-JSON interpretation of the spread
pub fn build_interpret_prompt(reading: &Reading, lang: &str, deck: Option<&Deck>) -> String {
    let (positions, advices) = lines_and_advices(reading, lang, deck);
    let draft = serde_json::json!({
        "question": reading.question,
        "positions": positions,
        "advices": advices,
        "cards": card_contexts(reading, lang, deck),
        "guidelines": [
            "Connect everything through the Solution card in position 8",
            "No deterministic claims; use the tone of hypotheses and suggestions",
            "Exactly three actionable advices",
        ],
    });
    let roles = role_map(lang)[..7].join(", ");

    format!(
        "You are a tarot master with 30 years of experience. Respond in language: {lang}.\n\
         Use compassionate yet piercing insight. Avoid deterministic claims and avoid medical, legal or financial guidance.\n\
         IMPORTANT: Base ALL interpretation ONLY on the following cards (names, roles, orientation, meanings). Do NOT invent other cards.\n\
         Produce STRICT JSON (minified, no comments, no extra text).\n\
         Schema: {{\"summary\": string, \"sections\": {{<role>: {{\"card\": string, \"orientation\": string, \"analysis\": string}}}}, \"advices\": [{{\"type\": \"solution\"|\"support\", \"text\": string}}, {{...}}, {{...}}]}}\n\
         Rules:\n\
         1) Address the user's question first: '{question}'.\n\
         2) Summary: 5-7 sentences, no position citations, grounded in the cards.\n\
         3) Fill sections mapping the roles ({roles}) to card name, orientation and a short analysis tailored to the question.\n\
         4) Exactly 3 advices: the first is type=solution and synthesizes the cards with the question; the other two are type=support. Each advice short, actionable, concrete.\n\
         5) Ground every statement in the provided card meanings.\n\
         Draft: {draft}\n\
         Return ONLY the JSON object.",
        lang = lang,
        question = reading.question,
        roles = roles,
        draft = draft,
    )
}

/// Prompt asking for one short analysis per card as a JSON array of strings
pub fn build_details_prompt(reading: &Reading, lang: &str, deck: Option<&Deck>) -> String {
    let cards = card_contexts(reading, lang, deck);
    let cards_json = serde_json::to_string(&cards).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are a tarot master with 30 years of experience. Respond in language: {lang}.\n\
         For each card below, write a 2-3 sentence analysis tailored to the user's question: '{question}'.\n\
         Ground it in the meanings and the role, avoid determinism. Return a STRICT JSON array of strings, length={len}.\n\
         Cards: {cards}",
        lang = lang,
        question = reading.question,
        len = cards.len(),
        cards = cards_json,
    )
}

/// Summary, advices and sections recovered from a model response
#[derive(Debug, Clone, PartialEq)]
pub struct LlmInterpretation {
    pub summary: String,
    pub advices: Vec<String>,
    pub sections: Option<Sections>,
}

/// Slice from the first `open` to the last `close`, inclusive
fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parses the first JSON object of a response
///
/// Accepts it only when it has a non-empty `summary` and at least three
/// advices; advices may be strings or objects with a `text` field.
pub fn parse_llm_interpretation(text: &str) -> Option<LlmInterpretation> {
    let obj: Value = serde_json::from_str(outermost(text, '{', '}')?).ok()?;
    let obj = obj.as_object()?;

    let summary = match obj.get("summary")? {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if summary.is_empty() {
        return None;
    }

    let advices: Vec<String> = obj
        .get("advices")?
        .as_array()?
        .iter()
        .take(3)
        .map(|advice| match advice {
            Value::Object(map) => map
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    if advices.len() != 3 {
        return None;
    }

    let sections = obj
        .get("sections")
        .and_then(|s| serde_json::from_value::<Sections>(s.clone()).ok());

    Some(LlmInterpretation {
        summary,
        advices,
        sections,
    })
}

/// First three `- ` bullet lines of a free-text response, if there are at least three
pub fn bullet_advices(text: &str) -> Option<Vec<String>> {
    if !text.contains("- ") {
        return None;
    }
    let bullets: Vec<String> = text
        .lines()
        .filter(|line| line.trim().starts_with('-'))
        .map(|line| line.trim_matches(|c| c == '-' || c == ' ').to_string())
        .collect();
    (bullets.len() >= 3).then(|| bullets.into_iter().take(3).collect())
}

/// Builds the interpretation for a model response
///
/// Falls back to bullet-list advices and then to the local advices when the
/// response is not the expected JSON.
pub fn interpretation_from_llm(reading: &Reading, lang: &str, deck: Option<&Deck>, text: &str) -> Interpretation {
    let (positions, local_advices) = lines_and_advices(reading, lang, deck);

    let (summary, advices, sections) = match parse_llm_interpretation(text) {
        Some(parsed) => (parsed.summary, parsed.advices, parsed.sections),
        None => (
            text.to_string(),
            bullet_advices(text).unwrap_or(local_advices),
            None,
        ),
    };

    Interpretation {
        id: reading.get_id(),
        lang: lang.to_string(),
        summary,
        positions,
        advices,
        llm_used: true,
        sections,
    }
}

/// Parses the per-card details array, padding with empty strings when absent
pub fn parse_llm_details(text: &str, expected: usize) -> Vec<String> {
    let parsed = outermost(text, '[', ']')
        .and_then(|slice| serde_json::from_str::<Vec<Value>>(slice).ok())
        .map(|values| {
            values
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
        });

    parsed.unwrap_or_else(|| vec![String::new(); expected])
}
