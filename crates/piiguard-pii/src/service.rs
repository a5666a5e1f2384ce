//! Caller-facing guard service
//!
//! Wires the configuration store, pattern cache, orchestrator, merge engine
//! and token manager into `mask` / `unmask` / `process`, and exposes the
//! configuration mutations with the cache reload each of them needs.

use std::collections::BTreeMap;
use std::sync::Arc;

use piiguard_core::{
    GuardConfigStore, GuardType, Result,
    guard::{
        FieldDefinitionUpdate, GuardTypeUpdate, NewFieldDefinition, NewGuardType,
        NewRegexPattern, RegexPatternUpdate, RowId,
    },
    llm::LlmClient,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::candidate::CandidateEntity;
use crate::merge::{self, MergeRules};
use crate::orchestrator::DetectionOrchestrator;
use crate::pattern_cache::{PatternCache, ReloadReport};
use crate::rules::{self, ActiveField};
use crate::tokenizer::{self, MaskedDocument, TokenManager};

/// Prepended to every masked prompt sent to the model
pub const LLM_INSTRUCTION: &str = "ATTENTION : les entités sensibles de ce texte ont été \
remplacées par des tokens de la forme <type:TOKEN_xxx>. Quand vous répondez à propos d'une \
entité masquée, réutilisez exactement le token correspondant, sans inventer ni deviner la \
donnée réelle. Exemple : si on demande le numéro de sécurité sociale, répondez \
<social_security:TOKEN_xxx>.";

/// Result of a full mask / model / unmask round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub original: String,
    pub masked: String,
    pub token_map: BTreeMap<String, String>,
    pub llm_response: String,
    pub unmasked: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub masked_token_count: usize,
    pub model: Option<String>,
}

/// Masking service for one configuration store
pub struct GuardService {
    store: Arc<dyn GuardConfigStore>,
    patterns: PatternCache,
    orchestrator: DetectionOrchestrator,
    merge_rules: MergeRules,
    tokens: TokenManager,
}

impl GuardService {
    /// Build the service and load the pattern cache
    pub async fn new(
        store: Arc<dyn GuardConfigStore>,
        orchestrator: DetectionOrchestrator,
        merge_rules: MergeRules,
        tokens: TokenManager,
    ) -> Result<Self> {
        let service = Self {
            store,
            patterns: PatternCache::new(),
            orchestrator,
            merge_rules,
            tokens,
        };
        service.reload_patterns().await?;
        Ok(service)
    }

    pub fn store(&self) -> &Arc<dyn GuardConfigStore> {
        &self.store
    }

    pub fn pattern_cache(&self) -> &PatternCache {
        &self.patterns
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Recompile every active pattern of the store
    pub async fn reload_patterns(&self) -> Result<ReloadReport> {
        self.patterns.reload_from(self.store.as_ref()).await
    }

    /// Rules of a guard type, read from one store snapshot and one cache snapshot
    async fn active_fields(&self, guard_type: &str) -> Result<Vec<ActiveField>> {
        let guard = self.store.guard_snapshot(guard_type).await?;
        let patterns = self.patterns.snapshot();
        Ok(rules::resolve_fields(&guard, &patterns))
    }

    /// Raw candidates, before conflict resolution
    ///
    /// # Errors
    /// - `Error::GuardTypeNotFound` if the guard type is missing or inactive
    pub async fn detect(&self, text: &str, guard_type: &str) -> Result<Vec<CandidateEntity>> {
        let fields = self.active_fields(guard_type).await?;
        Ok(self.orchestrator.detect(text, &fields).await)
    }

    /// Final disjoint entities sorted by `start`
    pub async fn analyze(&self, text: &str, guard_type: &str) -> Result<Vec<CandidateEntity>> {
        let candidates = self.detect(text, guard_type).await?;
        Ok(merge::resolve(
            text,
            candidates,
            &self.merge_rules,
            &self.orchestrator.settings().security_code,
        ))
    }

    pub async fn mask(&self, text: &str, guard_type: &str) -> Result<MaskedDocument> {
        let entities = self.analyze(text, guard_type).await?;
        let doc = self.tokens.mask(text, &entities)?;
        debug!("Masked text for '{}': {}", guard_type, doc.masked_text);
        Ok(doc)
    }

    pub fn unmask(&self, text: &str, token_map: &BTreeMap<String, String>) -> String {
        tokenizer::unmask(text, token_map)
    }

    /// Mask `text`, send it to the model and unmask the reply
    ///
    /// # Errors
    /// - `Error::GuardTypeNotFound` if the guard type is missing or inactive
    /// - `Error::Llm` if the model call fails
    pub async fn process(
        &self,
        text: &str,
        guard_type: &str,
        llm: &dyn LlmClient,
    ) -> Result<ProcessOutcome> {
        let doc = self.mask(text, guard_type).await?;
        let prompt = format!("{}\n\n{}", LLM_INSTRUCTION, doc.masked_text);

        let reply = llm.complete(&prompt).await?;
        let unmasked = self.unmask(&reply.content, &doc.token_map);

        info!(
            "Processed text for '{}': {} tokens masked, {} prompt / {} completion tokens",
            guard_type,
            doc.token_count(),
            reply.prompt_tokens,
            reply.completion_tokens
        );

        Ok(ProcessOutcome {
            original: text.to_string(),
            masked_token_count: doc.token_count(),
            total_tokens: reply.total_tokens(),
            model: reply.model.clone().or_else(|| llm.model().map(str::to_string)),
            prompt_tokens: reply.prompt_tokens,
            completion_tokens: reply.completion_tokens,
            llm_response: reply.content,
            unmasked,
            masked: doc.masked_text,
            token_map: doc.token_map,
        })
    }

    /// Sample sentence built from the example values of a guard type's fields
    pub async fn example_text(&self, guard_type: &str) -> Result<String> {
        let snapshot = self.store.guard_snapshot(guard_type).await?;
        let parts: Vec<String> = snapshot
            .fields
            .iter()
            .filter(|f| !f.example_value.trim().is_empty())
            .map(|f| format!("{} : {}", f.display_name, f.example_value))
            .collect();

        if parts.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}.", parts.join(", ")))
    }

    pub async fn list_guard_types(&self) -> Result<Vec<GuardType>> {
        self.store.list_guard_types().await
    }

    pub async fn create_guard_type(&self, input: NewGuardType) -> Result<RowId> {
        self.store.create_guard_type(input).await
    }

    pub async fn update_guard_type(&self, name: &str, update: GuardTypeUpdate) -> Result<bool> {
        self.store.update_guard_type(name, update).await
    }

    pub async fn deactivate_guard_type(&self, name: &str) -> Result<()> {
        self.store.deactivate_guard_type(name).await
    }

    pub async fn create_field_definition(
        &self,
        guard_type: &str,
        input: NewFieldDefinition,
    ) -> Result<RowId> {
        let id = self.store.create_field_definition(guard_type, input).await?;
        self.reload_patterns().await?;
        Ok(id)
    }

    pub async fn update_field_definition(
        &self,
        field_id: RowId,
        update: FieldDefinitionUpdate,
    ) -> Result<bool> {
        let touches_pattern = update.touches_pattern();
        let changed = self.store.update_field_definition(field_id, update).await?;
        if changed && touches_pattern {
            self.reload_patterns().await?;
        }
        Ok(changed)
    }

    pub async fn deactivate_field_definition(&self, field_id: RowId) -> Result<()> {
        self.store.deactivate_field_definition(field_id).await
    }

    pub async fn create_regex_pattern(&self, input: NewRegexPattern) -> Result<RowId> {
        let id = self.store.create_regex_pattern(input).await?;
        self.reload_patterns().await?;
        Ok(id)
    }

    pub async fn update_regex_pattern(
        &self,
        name: &str,
        update: RegexPatternUpdate,
    ) -> Result<bool> {
        let changed = self.store.update_regex_pattern(name, update).await?;
        if changed {
            self.reload_patterns().await?;
        }
        Ok(changed)
    }

    pub async fn deactivate_regex_pattern(&self, name: &str) -> Result<()> {
        self.store.deactivate_regex_pattern(name).await?;
        self.reload_patterns().await?;
        Ok(())
    }
}
