//! Integration test: bare 3-4 digit security codes need lexical context

mod common;

use common::seeded_service;

#[tokio::test]
async fn test_number_without_trigger_is_not_masked() {
    let service = seeded_service().await;

    let doc = service.mask("mon code est 1999", "TypeB").await.unwrap();
    assert_eq!(doc.masked_text, "mon code est 1999");
    assert!(doc.token_map.is_empty());
}

#[tokio::test]
async fn test_number_after_trigger_is_masked() {
    let service = seeded_service().await;

    let entities = service.analyze("mon cvv est 381", "TypeB").await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].entity_type, "cvv");
    assert_eq!(entities[0].text, "381");

    let doc = service.mask("mon cvv est 381", "TypeB").await.unwrap();
    assert!(doc.masked_text.starts_with("mon cvv est <cvv:TOKEN_"));
}

#[tokio::test]
async fn test_card_groups_are_not_security_codes() {
    let service = seeded_service().await;
    let text = "Carte 4532 9876 1122 4456, cryptogramme 123";

    let entities = service.analyze(text, "TypeB").await.unwrap();
    let found: Vec<(&str, &str)> = entities
        .iter()
        .map(|e| (e.entity_type.as_str(), e.text.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![("credit_card", "4532 9876 1122 4456"), ("cvv", "123")]
    );
}

#[tokio::test]
async fn test_trigger_outside_lookback_window() {
    let service = seeded_service().await;
    let text = "cvv : voir le document joint envoyé hier soir, code 482";

    let doc = service.mask(text, "TypeB").await.unwrap();
    assert_eq!(doc.masked_text, text);
}
