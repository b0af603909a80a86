use std::sync::Arc;

use super::*;
use crate::llm::tests::StubGenerator;
use crate::models::GroupOrder;
use crate::test_utils::{test_config, test_state, test_state_with};

fn request(seed: i64) -> ReadingRequest {
    let mut request = ReadingRequest::new("Will the move go well?", vec![GroupOrder::B, GroupOrder::C, GroupOrder::A]);
    request.seed = Some(seed);
    request
}

fn llm_state(answer: &str) -> (AppState, Arc<StubGenerator>) {
    let stub = Arc::new(StubGenerator::answering(answer));
    let state = test_state_with(test_config(), Some(stub.clone() as Arc<dyn TextGenerator>));
    (state, stub)
}

#[tokio::test]
async fn test_create_and_save_reading_stores_and_shares() {
    let state = test_state();
    let reading = create_and_save_reading(&state, &request(7)).await.unwrap();
    let id = reading.get_id();

    assert_eq!(reading.count, 8);
    assert_eq!(get_reading(&state, &id).unwrap(), reading);

    // The share slug was created with the reading, so sharing returns it unchanged
    let link = share_reading(&state, &id).unwrap();
    assert_eq!(share_reading(&state, &id).unwrap().slug, link.slug);
    assert_eq!(resolve_share(&state, &link.slug).unwrap().id, Some(id));
}

#[tokio::test]
async fn test_seeded_readings_draw_the_same_cards() {
    let state = test_state();
    let a = create_and_save_reading(&state, &request(42)).await.unwrap();
    let b = create_and_save_reading(&state, &request(42)).await.unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(a.items, b.items);
}

#[test]
fn test_missing_reading_is_not_found() {
    let state = test_state();
    assert!(matches!(get_reading(&state, "nope"), Err(ApiError::NotFound(_))));
    assert!(matches!(share_reading(&state, "nope"), Err(ApiError::NotFound(_))));
    assert!(matches!(resolve_share(&state, "0-abcdef"), Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_interpret_and_cache_without_llm_key() {
    let state = test_state();
    let id = create_and_save_reading(&state, &request(1)).await.unwrap().get_id();

    // use_llm is ignored when no generator is configured
    let request = InterpretRequest {
        lang: "en".to_string(),
        style: "concise".to_string(),
        use_llm: true,
    };
    let interp = interpret_and_cache(&state, &id, &request).await.unwrap();
    assert!(!interp.llm_used);
    assert_eq!(interp.positions.len(), 8);

    let cached = state.readings.get_interpretation(&id, "en", "concise", false).unwrap();
    assert_eq!(cached, Some(interp));
}

#[tokio::test]
async fn test_interpret_and_cache_resolves_auto() {
    let state = test_state();
    let mut req = request(3);
    req.question = "이직해도 될까요?".to_string();
    let id = create_and_save_reading(&state, &req).await.unwrap().get_id();

    let request = InterpretRequest {
        lang: "auto".to_string(),
        ..Default::default()
    };
    let interp = interpret_and_cache(&state, &id, &request).await.unwrap();
    assert_eq!(interp.lang, "ko");
}

#[tokio::test]
async fn test_interpret_and_cache_uses_llm_once() {
    let (state, stub) = llm_state(r#"{"summary":"Steady","advices":["a","b","c"]}"#);
    let id = create_and_save_reading(&state, &request(5)).await.unwrap().get_id();

    let request = InterpretRequest {
        lang: "en".to_string(),
        style: "concise".to_string(),
        use_llm: true,
    };
    let first = interpret_and_cache(&state, &id, &request).await.unwrap();
    let second = interpret_and_cache(&state, &id, &request).await.unwrap();

    assert!(first.llm_used);
    assert_eq!(first, second);
    assert_eq!(stub.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_full_result_local() {
    let state = test_state();
    let id = create_and_save_reading(&state, &request(9)).await.unwrap().get_id();

    let result = get_full_result(&state, &id, "auto", false).await.unwrap();
    assert_eq!(result.lang, "en");
    assert_eq!(result.items.len(), 8);
    assert_eq!(result.items[0].role, "Issue");
    assert_eq!(result.items[7].role, "Solution");
    for item in &result.items {
        assert!(item.used_meanings.as_ref().unwrap().len() <= 3);
        assert!(item.llm_detail.is_none());
    }
    assert!(!result.llm_used);
}

#[tokio::test]
async fn test_full_result_attaches_llm_details() {
    let (state, _stub) = llm_state(r#"["d1","d2","d3","d4","d5","d6","d7","d8"]"#);
    let id = create_and_save_reading(&state, &request(11)).await.unwrap().get_id();

    let result = get_full_result(&state, &id, "ja", true).await.unwrap();
    assert_eq!(result.items[0].llm_detail.as_deref(), Some("d1"));
    assert_eq!(result.items[7].llm_detail.as_deref(), Some("d8"));
    assert_eq!(result.items[0].role, "課題");
    assert!(state.readings.get_details(&id, "ja", true).unwrap().is_some());
}

#[tokio::test]
async fn test_full_result_missing_reading() {
    let state = test_state();
    let err = get_full_result(&state, "missing", "ko", false).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_daily_fortune_is_seeded() {
    let state = test_state();
    let a = daily_fortune(&state, "en", Some(2024), false).await.unwrap();
    let b = daily_fortune(&state, "en", Some(2024), false).await.unwrap();

    assert_eq!(a.card, b.card);
    assert_eq!(a.card.position, 1);
    assert_eq!(a.card.role, "Issue");
    assert_eq!(a.date, Utc::now().date_naive().to_string());
    assert!(!a.llm_used);
}

#[tokio::test]
async fn test_daily_fortune_auto_lang_is_korean() {
    let state = test_state();
    let fortune = daily_fortune(&state, "auto", Some(1), false).await.unwrap();
    assert_eq!(fortune.lang, "ko");
    assert_eq!(fortune.card.role, "이슈");
}
