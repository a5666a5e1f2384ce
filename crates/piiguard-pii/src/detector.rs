//! Pluggable entity detectors
//!
//! NER backends (model ensembles, remote analyzers, gazetteers) implement
//! [`EntityDetector`]. The orchestrator only sees raw spans; it never looks
//! inside a model.

mod name_list;

pub use name_list::NameListDetector;

use async_trait::async_trait;
use piiguard_core::Result;
use serde::{Deserialize, Serialize};

use crate::candidate::Source;

/// Span reported by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpan {
    /// The detected text
    pub text: String,

    /// Start position in the text (bytes)
    pub start: usize,

    /// End position in the text (bytes, exclusive)
    pub end: usize,

    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,
}

impl RawSpan {
    pub fn new(text: impl Into<String>, start: usize, end: usize, confidence: f32) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence,
        }
    }
}

/// Trait for detecting entities of a canonical type in text
#[async_trait]
pub trait EntityDetector: Send + Sync {
    /// Name used in logs and `DetectorUnavailable` errors
    fn name(&self) -> &str;

    /// Source tag given to candidates built from this detector's spans
    fn source(&self) -> Source {
        Source::NerModel
    }

    /// Whether the detector can answer for this canonical type
    fn supports(&self, canonical_type: &str) -> bool {
        let _ = canonical_type;
        true
    }

    /// Detect spans of `canonical_type` in `text`
    ///
    /// # Errors
    /// - `Error::DetectorUnavailable` when the backend fails; the
    ///   orchestrator treats it as zero spans
    async fn detect_entities(
        &self,
        text: &str,
        canonical_type: &str,
        language_hint: &str,
    ) -> Result<Vec<RawSpan>>;
}
