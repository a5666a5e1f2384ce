//! Detection orchestrator
//!
//! Runs the regex rules of a guard type and queries the NER detectors for
//! its entity types, producing the flat candidate list fed to the merge
//! engine. Detector failures and timeouts cost recall, never the request.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use piiguard_core::Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::candidate::{CandidateEntity, Source};
use crate::context::SecurityCodeRules;
use crate::detector::EntityDetector;
use crate::pattern_cache::CompiledPattern;
use crate::rules::ActiveField;

/// Tunables of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Language passed to NER detectors
    pub language_hint: String,

    /// Confidence given to regex matches
    pub regex_confidence: f32,

    /// Deadline for one detector call; 0 disables it
    pub detector_timeout_ms: u64,

    pub security_code: SecurityCodeRules,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            language_hint: "fr".to_string(),
            regex_confidence: 0.9,
            detector_timeout_ms: 2000,
            security_code: SecurityCodeRules::default(),
        }
    }
}

/// Produces raw candidates for one document
pub struct DetectionOrchestrator {
    detectors: Vec<Arc<dyn EntityDetector>>,
    settings: DetectionSettings,
}

impl DetectionOrchestrator {
    pub fn new(settings: DetectionSettings) -> Self {
        Self {
            detectors: Vec::new(),
            settings,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn EntityDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn add_detector(&mut self, detector: Arc<dyn EntityDetector>) {
        self.detectors.push(detector);
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Collect candidates for `fields` over `text`.
    ///
    /// The result is sorted by `(start, end, field, source)` so it does not
    /// depend on the order in which detectors answered.
    pub async fn detect(&self, text: &str, fields: &[ActiveField]) -> Vec<CandidateEntity> {
        let mut candidates = Vec::new();

        for field in fields {
            if let Some(pattern) = field.rule.pattern() {
                candidates.extend(self.run_pattern(text, &field.field_name, pattern));
            }
        }

        let queries = fields.iter().filter_map(|field| {
            field
                .rule
                .entity_type()
                .map(|entity_type| (field.field_name.as_str(), entity_type))
        });
        let mut calls = Vec::new();
        for (field_name, entity_type) in queries {
            for detector in self.detectors.iter().filter(|d| d.supports(entity_type)) {
                calls.push(self.query(detector.as_ref(), text, field_name, entity_type));
            }
        }
        for found in join_all(calls).await {
            candidates.extend(found);
        }

        candidates.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.end.cmp(&b.end))
                .then_with(|| a.entity_type.cmp(&b.entity_type))
                .then_with(|| b.source.rank().cmp(&a.source.rank()))
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.text.cmp(&b.text))
        });
        debug!("Collected {} candidates from {} fields", candidates.len(), fields.len());
        candidates
    }

    /// Regex matches of one field.
    ///
    /// Bare 3-4 digit patterns only keep matches that pass the security-code
    /// context check.
    pub fn run_pattern(
        &self,
        text: &str,
        field_name: &str,
        pattern: &CompiledPattern,
    ) -> Vec<CandidateEntity> {
        pattern
            .regex
            .find_iter(text)
            .filter(|m| !m.as_str().is_empty())
            .filter(|m| {
                !pattern.is_bare_short_digit
                    || self.settings.security_code.accepts(text, m.start(), m.end())
            })
            .map(|m| {
                CandidateEntity::new(
                    m.as_str(),
                    field_name,
                    m.start(),
                    m.end(),
                    Source::RegexConfig,
                    self.settings.regex_confidence,
                )
            })
            .collect()
    }

    async fn query(
        &self,
        detector: &dyn EntityDetector,
        text: &str,
        field_name: &str,
        entity_type: &str,
    ) -> Vec<CandidateEntity> {
        let call = detector.detect_entities(text, entity_type, &self.settings.language_hint);
        let result = if self.settings.detector_timeout_ms == 0 {
            call.await
        } else {
            let deadline = Duration::from_millis(self.settings.detector_timeout_ms);
            match tokio::time::timeout(deadline, call).await {
                Ok(result) => result,
                Err(_) => Err(Error::DetectorUnavailable {
                    detector: detector.name().to_string(),
                    reason: format!("timed out after {}ms", self.settings.detector_timeout_ms),
                }),
            }
        };

        match result {
            Ok(spans) => {
                let source = detector.source();
                spans
                    .into_iter()
                    .map(|span| {
                        CandidateEntity::new(
                            span.text,
                            field_name,
                            span.start,
                            span.end,
                            source,
                            span.confidence.clamp(0.0, 1.0),
                        )
                        .with_canonical_type(entity_type)
                    })
                    .collect()
            }
            Err(e) => {
                let e = match e {
                    e @ Error::DetectorUnavailable { .. } => e,
                    other => Error::DetectorUnavailable {
                        detector: detector.name().to_string(),
                        reason: other.to_string(),
                    },
                };
                warn!("{} (field '{}'), continuing without it", e, field_name);
                Vec::new()
            }
        }
    }
}
