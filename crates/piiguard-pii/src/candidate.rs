//! Candidate entities produced by detectors

use serde::{Deserialize, Serialize};

/// Origin of a candidate entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Operator-configured regex pattern
    RegexConfig,

    /// External NER model
    NerModel,

    /// Built-in heuristic (gazetteers, word lists)
    Heuristic,

    /// Produced by the merge engine from two accepted entities
    Merged,
}

impl Source {
    /// Priority used when two candidates overlap; higher wins
    pub fn rank(self) -> u8 {
        match self {
            Source::RegexConfig => 3,
            Source::Merged => 2,
            Source::NerModel => 1,
            Source::Heuristic => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::RegexConfig => "regex_config",
            Source::NerModel => "ner_model",
            Source::Heuristic => "heuristic",
            Source::Merged => "merged",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detector's opinion about a span of the source text
///
/// Offsets are half-open byte offsets into the source text and always fall on
/// `char` boundaries for candidates that survive validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntity {
    /// Substring as detected
    pub text: String,

    /// Field name of the guard type (e.g. `email`, `name`)
    pub entity_type: String,

    /// Start position in the text
    pub start: usize,

    /// End position in the text
    pub end: usize,

    pub source: Source,

    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,

    /// Canonical NER label the field maps to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_type: Option<String>,

    /// Field name before cross-type unification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
}

impl CandidateEntity {
    pub fn new(
        text: impl Into<String>,
        entity_type: impl Into<String>,
        start: usize,
        end: usize,
        source: Source,
        confidence: f32,
    ) -> Self {
        Self {
            text: text.into(),
            entity_type: entity_type.into(),
            start,
            end,
            source,
            confidence,
            canonical_type: None,
            provenance: None,
        }
    }

    pub fn with_canonical_type(mut self, canonical_type: impl Into<String>) -> Self {
        self.canonical_type = Some(canonical_type.into());
        self
    }

    /// Length of the span in bytes
    pub fn span_len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the half-open intervals intersect
    pub fn overlaps(&self, other: &CandidateEntity) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `self` lies inside `other` (bounds inclusive)
    pub fn is_within(&self, other: &CandidateEntity) -> bool {
        other.start <= self.start && self.end <= other.end
    }

    pub fn same_span(&self, other: &CandidateEntity) -> bool {
        self.start == other.start && self.end == other.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_rank_order() {
        assert!(Source::RegexConfig.rank() > Source::Merged.rank());
        assert!(Source::Merged.rank() > Source::NerModel.rank());
        assert!(Source::NerModel.rank() > Source::Heuristic.rank());
    }

    #[test]
    fn test_source_serialization() {
        let json = serde_json::to_string(&Source::RegexConfig).unwrap();
        assert_eq!(json, "\"regex_config\"");
        assert_eq!(Source::NerModel.to_string(), "ner_model");
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = CandidateEntity::new("Marie", "name", 0, 5, Source::NerModel, 0.8);
        let b = CandidateEntity::new("Dubois", "name", 5, 11, Source::NerModel, 0.8);
        let c = CandidateEntity::new("ie D", "name", 3, 7, Source::NerModel, 0.8);

        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }
}
