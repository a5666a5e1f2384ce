//! Integration test: configuration changes seen by the masking pipeline

mod common;

use common::{seeded_service, seeded_store, service_with, SECRET};
use piiguard_config_file::{seed_defaults, FileConfigStore};
use piiguard_core::{
    Error, GuardConfigStore,
    guard::{DetectionMode, FieldDefinitionUpdate, NewFieldDefinition, NewRegexPattern},
};
use piiguard_pii::DetectionSettings;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_create_field_twice_returns_same_id() {
    let service = seeded_service().await;

    let input = NewFieldDefinition::ner("company", "Entreprise", "ORGANIZATION");
    let first = service
        .create_field_definition("TypeA", input.clone())
        .await
        .unwrap();
    let second = service.create_field_definition("TypeA", input).await.unwrap();

    assert_eq!(first, second);
    let fields = service.store().list_active_fields_for("TypeA").await.unwrap();
    assert_eq!(fields.iter().filter(|f| f.field_name == "company").count(), 1);
}

#[tokio::test]
async fn test_new_pattern_is_used_after_write() {
    let service = seeded_service().await;
    let text = "Ticket REF-2024-0042 ouvert";

    assert!(service.analyze(text, "InfoPerso").await.unwrap().is_empty());

    service
        .create_regex_pattern(NewRegexPattern::new("ticket", "Ticket", r"REF-\d{4}-\d{4}"))
        .await
        .unwrap();
    service
        .create_field_definition("InfoPerso", NewFieldDefinition::regex("ticket", "Ticket", "ticket"))
        .await
        .unwrap();

    let entities = service.analyze(text, "InfoPerso").await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].text, "REF-2024-0042");
}

#[tokio::test]
async fn test_deactivated_pattern_stops_matching() {
    let service = seeded_service().await;
    let text = "écrire à marie@exemple.fr";
    assert_eq!(service.analyze(text, "InfoPerso").await.unwrap().len(), 1);

    service.deactivate_regex_pattern("email").await.unwrap();
    assert!(service.pattern_cache().get("email").is_none());
    assert!(service.analyze(text, "InfoPerso").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_switching_field_to_hybrid_reloads() {
    let service = seeded_service().await;
    let email = service
        .store()
        .list_active_fields_for("InfoPerso")
        .await
        .unwrap()
        .into_iter()
        .find(|f| f.field_name == "email")
        .unwrap();

    let changed = service
        .update_field_definition(
            email.id,
            FieldDefinitionUpdate {
                detection_mode: Some(DetectionMode::Hybrid),
                canonical_entity_type: Some("courriel".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(changed);

    let entities = service.analyze("écrire à marie@exemple.fr", "InfoPerso").await.unwrap();
    assert_eq!(entities.len(), 1);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let service = seeded_service().await;

    let bad_pattern = service
        .create_regex_pattern(NewRegexPattern::new("broken", "Broken", r"(\d{3"))
        .await;
    assert!(matches!(bad_pattern, Err(Error::InvalidPattern { .. })));

    let bad_entity = service
        .create_field_definition("TypeA", NewFieldDefinition::ner("shoe", "Pointure", "SHOE_SIZE"))
        .await;
    assert!(matches!(bad_entity, Err(Error::UnknownEntityType(_))));
}

#[tokio::test]
async fn test_deactivated_guard_type_is_not_found() {
    let service = seeded_service().await;
    service.deactivate_guard_type("TypeB").await.unwrap();

    let result = service.mask("mon cvv est 381", "TypeB").await;
    assert!(matches!(result, Err(Error::GuardTypeNotFound(_))));
    let names: Vec<String> = service
        .list_guard_types()
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["InfoPerso", "TypeA"]);
}

#[tokio::test]
async fn test_persisted_store_masks_identically_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("guards.yaml");
    let text = "IBAN FR7630006000011234567890189";

    let first = {
        let store = Arc::new(FileConfigStore::open(&path).await.unwrap());
        seed_defaults(store.as_ref()).await.unwrap();
        let service = service_with(store, DetectionSettings::default(), Vec::new(), SECRET).await;
        service.mask(text, "TypeB").await.unwrap()
    };

    let store = Arc::new(FileConfigStore::open(&path).await.unwrap());
    let report = seed_defaults(store.as_ref()).await.unwrap();
    assert!(report.is_empty());
    let service = service_with(store, DetectionSettings::default(), Vec::new(), SECRET).await;
    let second = service.mask(text, "TypeB").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.token_map.len(), 1);
}

#[tokio::test]
async fn test_concurrent_masking_shares_snapshot() {
    let service = Arc::new(
        service_with(seeded_store().await, DetectionSettings::default(), Vec::new(), SECRET).await,
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let text = format!("client{}@exemple.fr", i);
            let doc = service.mask(&text, "InfoPerso").await.unwrap();
            service.unmask(&doc.masked_text, &doc.token_map) == text
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }
}
