//! Per-field detection rules resolved against the pattern cache

use std::sync::Arc;

use piiguard_core::{DetectionMode, GuardSnapshot};
use tracing::warn;

use crate::pattern_cache::{CompiledPattern, PatternSnapshot};

/// How one field is detected, with every reference already resolved
#[derive(Debug, Clone)]
pub enum FieldRule {
    Regex(Arc<CompiledPattern>),
    Ner(String),
    Hybrid(Arc<CompiledPattern>, String),
}

impl FieldRule {
    pub fn pattern(&self) -> Option<&Arc<CompiledPattern>> {
        match self {
            FieldRule::Regex(p) | FieldRule::Hybrid(p, _) => Some(p),
            FieldRule::Ner(_) => None,
        }
    }

    /// Canonical entity type queried from NER detectors
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            FieldRule::Ner(t) | FieldRule::Hybrid(_, t) => Some(t),
            FieldRule::Regex(_) => None,
        }
    }

    pub fn mode(&self) -> DetectionMode {
        match self {
            FieldRule::Regex(_) => DetectionMode::Regex,
            FieldRule::Ner(_) => DetectionMode::Ner,
            FieldRule::Hybrid(..) => DetectionMode::Hybrid,
        }
    }
}

/// A field of the guard type being detected
#[derive(Debug, Clone)]
pub struct ActiveField {
    pub field_name: String,
    pub rule: FieldRule,
}

/// Resolve the fields of a guard snapshot into runnable rules.
///
/// A field whose pattern is missing from the cache (deactivated or failed to
/// compile) loses its regex half: hybrid fields fall back to NER only and
/// regex fields are skipped.
pub fn resolve_fields(guard: &GuardSnapshot, patterns: &PatternSnapshot) -> Vec<ActiveField> {
    let mut active = Vec::with_capacity(guard.fields.len());

    for field in &guard.fields {
        let pattern = field
            .pattern_ref
            .as_deref()
            .and_then(|name| patterns.get(name));
        let entity_type = field.canonical_entity_type.clone();

        let rule = match (field.detection_mode, pattern, entity_type) {
            (DetectionMode::Regex, Some(p), _) => FieldRule::Regex(p),
            (DetectionMode::Hybrid, Some(p), Some(t)) => FieldRule::Hybrid(p, t),
            (DetectionMode::Hybrid, None, Some(t)) => {
                warn!(
                    "Pattern '{}' unavailable, field '{}' falls back to NER",
                    field.pattern_ref.as_deref().unwrap_or_default(),
                    field.field_name
                );
                FieldRule::Ner(t)
            }
            (DetectionMode::Ner, _, Some(t)) => FieldRule::Ner(t),
            _ => {
                warn!(
                    "Field '{}' of '{}' has no usable rule, skipping",
                    field.field_name, guard.guard.name
                );
                continue;
            }
        };

        active.push(ActiveField {
            field_name: field.field_name.clone(),
            rule,
        });
    }

    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern_cache::PatternCache;
    use chrono::Utc;
    use piiguard_core::guard::{FieldDefinition, NewFieldDefinition, NewGuardType, NewRegexPattern};
    use piiguard_core::{GuardType, RegexPattern};

    fn snapshot(fields: Vec<NewFieldDefinition>) -> GuardSnapshot {
        let now = Utc::now();
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(i, f)| {
                let validated = f.validate(|_| true).unwrap();
                FieldDefinition::from_validated(i as u64 + 10, "InfoPerso", validated, now)
            })
            .collect();
        GuardSnapshot {
            guard: GuardType::from_input(1, &NewGuardType::new("InfoPerso", "Contact"), now),
            fields,
            version: 1,
        }
    }

    fn patterns() -> Arc<PatternSnapshot> {
        let cache = PatternCache::new();
        let email = RegexPattern::from_input(
            1,
            &NewRegexPattern::new("email", "E-mail", r"\S+@\S+"),
            Utc::now(),
        );
        cache.reload(&[email], 1);
        cache.snapshot()
    }

    #[test]
    fn test_resolve_fields_by_mode() {
        let guard = snapshot(vec![
            NewFieldDefinition::regex("email", "E-mail", "email"),
            NewFieldDefinition::ner("company", "Entreprise", "ORG"),
            NewFieldDefinition::hybrid("mail", "Mail", "email", "EMAIL"),
        ]);
        let fields = resolve_fields(&guard, &patterns());

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].rule.mode(), DetectionMode::Regex);
        assert_eq!(fields[1].rule.entity_type(), Some("ORGANIZATION"));
        assert!(fields[2].rule.pattern().is_some());
        assert_eq!(fields[2].rule.entity_type(), Some("EMAIL_ADDRESS"));
    }

    #[test]
    fn test_missing_pattern_degrades() {
        let guard = snapshot(vec![
            NewFieldDefinition::regex("phone", "Tél", "french_phone"),
            NewFieldDefinition::hybrid("mail", "Mail", "gone", "EMAIL"),
        ]);
        let fields = resolve_fields(&guard, &patterns());

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_name, "mail");
        assert_eq!(fields[0].rule.mode(), DetectionMode::Ner);
    }
}
