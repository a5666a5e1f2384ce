//! Deterministic tokenization and the mask/unmask round trip
//!
//! A token has the form `<field:TOKEN_xxxxxxxxxxxxxxxx>` where the digest is
//! the first hex characters of `SHA-256(secret + "_" + original)`. The same
//! secret and value always give the same token, across calls and restarts,
//! so a model that repeats a token in its reply can be unmasked.

use std::collections::BTreeMap;

use piiguard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::candidate::CandidateEntity;

/// Token format settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Hex characters of the digest kept in each token (1..=64)
    pub digest_len: usize,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self { digest_len: 16 }
    }
}

/// Masked text plus the map needed to restore it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedDocument {
    pub masked_text: String,
    /// token -> original substring
    pub token_map: BTreeMap<String, String>,
}

impl MaskedDocument {
    pub fn token_count(&self) -> usize {
        self.token_map.len()
    }
}

/// Builds tokens and applies them
#[derive(Clone)]
pub struct TokenManager {
    secret: String,
    digest_len: usize,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("secret", &"<redacted>")
            .field("digest_len", &self.digest_len)
            .finish()
    }
}

impl TokenManager {
    pub fn new(secret: impl Into<String>, settings: &TokenSettings) -> Self {
        Self {
            secret: secret.into(),
            digest_len: settings.digest_len.clamp(1, 64),
        }
    }

    /// Digest part of the token for `original`
    pub fn digest(&self, original: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"_");
        hasher.update(original.as_bytes());
        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(self.digest_len);
        hex
    }

    /// Full token for a value of `field`
    pub fn token_for(&self, field: &str, original: &str) -> String {
        format!("<{}:TOKEN_{}>", field, self.digest(original))
    }

    /// Replace each entity with its token.
    ///
    /// Entities must be sorted by `start` and pairwise disjoint, as produced
    /// by the merge engine.
    ///
    /// # Errors
    /// - `Error::MalformedSpan` if a span is out of bounds, splits a
    ///   character, or overlaps the previous one
    pub fn mask(&self, text: &str, entities: &[CandidateEntity]) -> Result<MaskedDocument> {
        let mut masked_text = String::with_capacity(text.len());
        let mut token_map = BTreeMap::new();
        let mut last_end = 0;

        for entity in entities {
            let malformed = || Error::MalformedSpan {
                start: entity.start,
                end: entity.end,
                len: text.len(),
            };
            if entity.start < last_end || entity.start >= entity.end {
                return Err(malformed());
            }
            let original = text.get(entity.start..entity.end).ok_or_else(malformed)?;

            // Text before this entity
            masked_text.push_str(&text[last_end..entity.start]);

            let token = self.token_for(&entity.entity_type, original);
            masked_text.push_str(&token);
            token_map.insert(token, original.to_string());

            last_end = entity.end;
        }

        // Remaining text
        masked_text.push_str(&text[last_end..]);

        debug!(
            "Masked {} entities into {} distinct tokens",
            entities.len(),
            token_map.len()
        );
        Ok(MaskedDocument {
            masked_text,
            token_map,
        })
    }

    /// Replace every token of `token_map` found in `text` with its original
    pub fn unmask(&self, text: &str, token_map: &BTreeMap<String, String>) -> String {
        unmask(text, token_map)
    }
}

/// Restore originals; tokens absent from the text are ignored
pub fn unmask(text: &str, token_map: &BTreeMap<String, String>) -> String {
    token_map
        .iter()
        .fold(text.to_string(), |acc, (token, original)| {
            if acc.contains(token.as_str()) {
                acc.replace(token.as_str(), original)
            } else {
                acc
            }
        })
}
