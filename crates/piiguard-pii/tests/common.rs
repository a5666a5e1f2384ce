//! Common test utilities for integration tests

use async_trait::async_trait;
use piiguard_config_file::{seed_defaults, FileConfigStore};
use piiguard_core::{
    Error, GuardConfigStore, Result,
    llm::{LlmClient, LlmReply},
};
use piiguard_pii::{
    DetectionOrchestrator, DetectionSettings, EntityDetector, GuardService, MergeRules, RawSpan,
    TokenManager, TokenSettings,
};
use std::sync::Arc;

pub const SECRET: &str = "integration-secret";

/// Detector reporting fixed words as entities of one canonical type
#[allow(dead_code)]
pub struct KeywordDetector {
    entity_type: String,
    words: Vec<String>,
    confidence: f32,
}

#[allow(dead_code)]
impl KeywordDetector {
    pub fn new(entity_type: &str, words: &[&str], confidence: f32) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            words: words.iter().map(|w| w.to_string()).collect(),
            confidence,
        }
    }
}

#[async_trait]
impl EntityDetector for KeywordDetector {
    fn name(&self) -> &str {
        "keywords"
    }

    fn supports(&self, canonical_type: &str) -> bool {
        canonical_type == self.entity_type
    }

    async fn detect_entities(&self, text: &str, _: &str, _: &str) -> Result<Vec<RawSpan>> {
        let mut spans = Vec::new();
        for word in &self.words {
            for (start, found) in text.match_indices(word.as_str()) {
                spans.push(RawSpan::new(found, start, start + found.len(), self.confidence));
            }
        }
        Ok(spans)
    }
}

/// Model stub answering with the masked text it was given
#[allow(dead_code)]
pub struct EchoLlm;

#[async_trait]
impl LlmClient for EchoLlm {
    async fn complete(&self, masked_prompt: &str) -> Result<LlmReply> {
        let body = masked_prompt
            .split_once("\n\n")
            .map(|(_, body)| body)
            .unwrap_or(masked_prompt);
        Ok(LlmReply {
            content: format!("Bien reçu : {}", body),
            prompt_tokens: 42,
            completion_tokens: 7,
            model: Some("echo".to_string()),
        })
    }
}

/// Model stub that always fails
#[allow(dead_code)]
pub struct DownLlm;

#[async_trait]
impl LlmClient for DownLlm {
    async fn complete(&self, _: &str) -> Result<LlmReply> {
        Err(Error::Llm("upstream unavailable".to_string()))
    }
}

/// Seeded in-memory store
#[allow(dead_code)]
pub async fn seeded_store() -> Arc<FileConfigStore> {
    let store = Arc::new(FileConfigStore::in_memory());
    seed_defaults(store.as_ref()).await.unwrap();
    store
}

/// Service over `store` with the given detectors and default settings
#[allow(dead_code)]
pub async fn service_with(
    store: Arc<FileConfigStore>,
    settings: DetectionSettings,
    detectors: Vec<Arc<dyn EntityDetector>>,
    secret: &str,
) -> GuardService {
    let mut orchestrator = DetectionOrchestrator::new(settings);
    for detector in detectors {
        orchestrator.add_detector(detector);
    }
    let store: Arc<dyn GuardConfigStore> = store;
    GuardService::new(
        store,
        orchestrator,
        MergeRules::default(),
        TokenManager::new(secret, &TokenSettings::default()),
    )
    .await
    .unwrap()
}

/// Seeded service with a PERSON detector for "Marie" and "Dubois"
#[allow(dead_code)]
pub async fn seeded_service() -> GuardService {
    let person: Arc<dyn EntityDetector> =
        Arc::new(KeywordDetector::new("PERSON", &["Marie", "Dubois"], 0.85));
    service_with(
        seeded_store().await,
        DetectionSettings::default(),
        vec![person],
        SECRET,
    )
    .await
}
