//! Gazetteer detector for person names

use aho_corasick::{AhoCorasick, MatchKind};
use async_trait::async_trait;
use piiguard_core::{Error, Result};
use tracing::debug;

use crate::candidate::Source;
use crate::detector::{EntityDetector, RawSpan};

const DEFAULT_CONFIDENCE: f32 = 0.6;

/// Common French and English first names
const DEFAULT_NAMES: &[&str] = &[
    "Alice", "Anne", "Antoine", "Camille", "Catherine", "Charles", "Chloé", "Claire", "David",
    "Élise", "Emma", "François", "Hugo", "Isabelle", "Jacques", "Jean", "Jeanne", "John", "Julie",
    "Julien", "Laura", "Léa", "Louis", "Lucas", "Manon", "Marc", "Marie", "Mary", "Michel",
    "Nathalie", "Nicolas", "Paul", "Philippe", "Pierre", "Sarah", "Sophie", "Thomas", "Vincent",
];

/// Detector answering `PERSON` from a fixed list of first names.
///
/// Matching is case-sensitive and whole-word only, so `Marie` matches in
/// "Marie Dubois" but not in "Mariel" or "marie".
pub struct NameListDetector {
    automaton: AhoCorasick,
    names: Vec<String>,
    confidence: f32,
}

impl NameListDetector {
    /// Build a detector over `names`
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|n| !n.trim().is_empty())
            .collect();

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&names)
            .map_err(|e| Error::DetectorUnavailable {
                detector: "name_list".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            automaton,
            names,
            confidence: DEFAULT_CONFIDENCE,
        })
    }

    /// Detector over the built-in first-name list
    pub fn with_default_names() -> Result<Self> {
        Self::new(DEFAULT_NAMES.iter().copied())
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn find(&self, text: &str) -> Vec<RawSpan> {
        self.automaton
            .find_iter(text)
            .filter(|m| is_word_boundary(text, m.start(), m.end()))
            .map(|m| RawSpan::new(&text[m.start()..m.end()], m.start(), m.end(), self.confidence))
            .collect()
    }
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

#[async_trait]
impl EntityDetector for NameListDetector {
    fn name(&self) -> &str {
        "name_list"
    }

    fn source(&self) -> Source {
        Source::Heuristic
    }

    fn supports(&self, canonical_type: &str) -> bool {
        canonical_type == "PERSON"
    }

    async fn detect_entities(
        &self,
        text: &str,
        canonical_type: &str,
        _language_hint: &str,
    ) -> Result<Vec<RawSpan>> {
        if !self.supports(canonical_type) {
            return Ok(Vec::new());
        }
        let spans = self.find(text);
        debug!("name_list found {} spans", spans.len());
        Ok(spans)
    }
}
