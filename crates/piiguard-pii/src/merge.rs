//! Conflict resolution and merge engine
//!
//! Turns the unordered candidates of one document into a final list of
//! disjoint entities sorted by `start`. The pipeline is a sequence of pure
//! steps, each usable on its own:
//!
//! 1. [`validate`] drops malformed candidates
//! 2. [`filter_false_positives`] removes heuristic false positives
//! 3. [`unify`] collapses interchangeable field types firing on one span
//! 4. [`select_non_overlapping`] keeps the best candidate per contested region
//! 5. [`merge_adjacent_names`] joins name fragments separated by a short gap
//!
//! Filtering and unification run before selection, so a discarded candidate
//! never claims a region and candidates sharing a span are still all present
//! when unified. Merged names go through the filter once more.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidate::{CandidateEntity, Source};
use crate::context::{self, SecurityCodeRules, DEFAULT_STOP_WORDS};

/// Field types treated as one concept when they fire on the same span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnificationGroup {
    pub canonical: String,
    pub members: Vec<String>,
}

/// Tunables of the merge engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeRules {
    /// Name-like field types eligible for adjacent merging
    pub name_fields: Vec<String>,

    /// Field type given to merged names
    pub name_canonical: String,

    /// Largest gap (in characters) bridged when merging names
    pub name_merge_max_gap: usize,

    /// Field types whose spans swallow name fragments found inside them
    pub email_fields: Vec<String>,

    pub unification_groups: Vec<UnificationGroup>,

    /// Values dropped whatever their field
    pub stop_words: Vec<String>,

    /// Minimum length (characters, trimmed) of a kept entity
    pub min_entity_chars: usize,
}

impl Default for MergeRules {
    fn default() -> Self {
        Self {
            name_fields: vec!["name".into(), "full_name".into(), "firstname".into()],
            name_canonical: "name".to_string(),
            name_merge_max_gap: 5,
            email_fields: vec!["email".into()],
            unification_groups: vec![UnificationGroup {
                canonical: "id_card".to_string(),
                members: vec!["id_card".into(), "passport".into()],
            }],
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            min_entity_chars: 2,
        }
    }
}

impl MergeRules {
    fn is_name_field(&self, field: &str) -> bool {
        self.name_fields.iter().any(|f| f == field)
    }

    fn is_email_field(&self, field: &str) -> bool {
        self.email_fields.iter().any(|f| f == field)
    }

    fn is_stop_word(&self, value: &str) -> bool {
        let value = value.trim().to_lowercase();
        self.stop_words.iter().any(|w| *w == value)
    }
}

/// Run the whole pipeline
pub fn resolve(
    text: &str,
    candidates: Vec<CandidateEntity>,
    rules: &MergeRules,
    security_code: &SecurityCodeRules,
) -> Vec<CandidateEntity> {
    let total = candidates.len();
    let valid = validate(text, candidates);
    let plausible = filter_false_positives(text, valid, rules, security_code);
    let unified = unify(plausible, rules);
    let selected = select_non_overlapping(unified);
    let merged = merge_adjacent_names(text, selected, rules);
    let kept = filter_false_positives(text, merged, rules, security_code);

    debug!("Resolved {} candidates into {} entities", total, kept.len());
    kept
}

/// Step 1: drop candidates that cannot be masked
pub fn validate(text: &str, candidates: Vec<CandidateEntity>) -> Vec<CandidateEntity> {
    candidates
        .into_iter()
        .filter(|c| {
            let ok = !c.text.trim().is_empty()
                && !c.entity_type.trim().is_empty()
                && c.start < c.end
                && c.end <= text.len()
                && text.is_char_boundary(c.start)
                && text.is_char_boundary(c.end)
                && c.confidence.is_finite();
            if !ok {
                debug!(
                    "Dropping malformed candidate [{}, {}) of type '{}'",
                    c.start, c.end, c.entity_type
                );
            }
            ok
        })
        .collect()
}

/// Step 3: collapse interchangeable field types firing on the identical span.
///
/// Within a group the regex-sourced candidate wins, then the most confident.
/// The survivor takes the group's canonical type and records its original
/// type as provenance.
pub fn unify(candidates: Vec<CandidateEntity>, rules: &MergeRules) -> Vec<CandidateEntity> {
    if rules.unification_groups.is_empty() {
        return candidates;
    }

    let mut slots: Vec<Option<CandidateEntity>> = candidates.into_iter().map(Some).collect();

    for group in &rules.unification_groups {
        let mut by_span: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (idx, slot) in slots.iter().enumerate() {
            if let Some(c) = slot {
                if group.members.contains(&c.entity_type) {
                    by_span.entry((c.start, c.end)).or_default().push(idx);
                }
            }
        }

        for indices in by_span.into_values() {
            let distinct_types = {
                let mut types: Vec<&str> = indices
                    .iter()
                    .filter_map(|&i| slots[i].as_ref().map(|c| c.entity_type.as_str()))
                    .collect();
                types.sort_unstable();
                types.dedup();
                types.len()
            };
            if distinct_types < 2 {
                continue;
            }

            // Reversed so that `max_by`, which keeps the last maximum, keeps
            // the earliest candidate
            let winner = indices.iter().copied().rev().max_by(|&a, &b| {
                match (&slots[a], &slots[b]) {
                    (Some(x), Some(y)) => unification_order(x, y),
                    _ => Ordering::Equal,
                }
            });
            let Some(winner) = winner else { continue };

            for &idx in &indices {
                if idx != winner {
                    slots[idx] = None;
                }
            }
            if let Some(c) = slots[winner].as_mut() {
                if c.entity_type != group.canonical {
                    c.provenance = Some(std::mem::replace(
                        &mut c.entity_type,
                        group.canonical.clone(),
                    ));
                }
                debug!(
                    "Unified {} candidates at [{}, {}) as '{}'",
                    indices.len(),
                    c.start,
                    c.end,
                    group.canonical
                );
            }
        }
    }

    slots.into_iter().flatten().collect()
}

/// Greater means preferred; earlier candidates win full ties
fn unification_order(a: &CandidateEntity, b: &CandidateEntity) -> Ordering {
    (a.source == Source::RegexConfig)
        .cmp(&(b.source == Source::RegexConfig))
        .then_with(|| a.confidence.total_cmp(&b.confidence))
        .then_with(|| a.source.rank().cmp(&b.source.rank()))
        .then_with(|| b.entity_type.cmp(&a.entity_type))
}

/// Arbitration order: best candidate first.
///
/// Compares `(source rank, confidence, span length)` descending, then the
/// earlier `start`. Field type and text only break exact ties so the result
/// never depends on input order.
pub fn priority_order(a: &CandidateEntity, b: &CandidateEntity) -> Ordering {
    b.source
        .rank()
        .cmp(&a.source.rank())
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| b.span_len().cmp(&a.span_len()))
        .then_with(|| a.start.cmp(&b.start))
        .then_with(|| a.entity_type.cmp(&b.entity_type))
        .then_with(|| a.text.cmp(&b.text))
}

/// Step 4: greedy non-overlap selection, output sorted by `start`
pub fn select_non_overlapping(mut candidates: Vec<CandidateEntity>) -> Vec<CandidateEntity> {
    candidates.sort_by(priority_order);

    let mut accepted: Vec<CandidateEntity> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if accepted.iter().any(|a| a.overlaps(&candidate)) {
            continue;
        }
        accepted.push(candidate);
    }

    accepted.sort_by_key(|c| c.start);
    accepted
}

/// Step 5: merge consecutive name fragments separated by a short gap.
///
/// Only neighbours in the sorted list are merged, so the result stays
/// disjoint. The merged text is the source slice covering both fragments.
pub fn merge_adjacent_names(
    text: &str,
    entities: Vec<CandidateEntity>,
    rules: &MergeRules,
) -> Vec<CandidateEntity> {
    let mut out: Vec<CandidateEntity> = Vec::with_capacity(entities.len());

    for entity in entities {
        let merge_with_last = match out.last() {
            Some(last) => {
                rules.is_name_field(&last.entity_type)
                    && rules.is_name_field(&entity.entity_type)
                    && last.end <= entity.start
                    && text
                        .get(last.end..entity.start)
                        .is_some_and(|gap| gap.chars().count() <= rules.name_merge_max_gap)
            }
            None => false,
        };

        if !merge_with_last {
            out.push(entity);
            continue;
        }

        let Some(last) = out.pop() else { continue };
        let start = last.start;
        let end = entity.end;
        let merged_text = text
            .get(start..end)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} {}", last.text, entity.text));

        debug!("Merged name fragments into [{}, {})", start, end);
        out.push(CandidateEntity {
            text: merged_text,
            entity_type: rules.name_canonical.clone(),
            start,
            end,
            source: Source::Merged,
            confidence: last.confidence.max(entity.confidence),
            canonical_type: last.canonical_type.or(entity.canonical_type),
            provenance: None,
        });
    }

    out
}

/// Step 2: drop stop words, too-short values, field-specific false
/// positives, unsupported short numbers and names inside email addresses.
///
/// Capitalized values of name fields are exempt from the stop-word list so
/// short surnames ("Ma", "Ni") survive; articles are still caught by the
/// per-field suspicious values.
pub fn filter_false_positives(
    text: &str,
    entities: Vec<CandidateEntity>,
    rules: &MergeRules,
    security_code: &SecurityCodeRules,
) -> Vec<CandidateEntity> {
    let emails: Vec<(usize, usize)> = entities
        .iter()
        .filter(|e| rules.is_email_field(&e.entity_type))
        .map(|e| (e.start, e.end))
        .collect();

    entities
        .into_iter()
        .filter(|e| {
            let value = e.text.trim();
            let reason = if value.chars().count() < rules.min_entity_chars {
                Some("too short")
            } else if rules.is_stop_word(value)
                && !(rules.is_name_field(&e.entity_type) && starts_uppercase(value))
            {
                Some("stop word")
            } else if context::is_suspicious(&e.entity_type, value) {
                Some("suspicious value")
            } else if e.source != Source::RegexConfig
                && context::is_short_number(value)
                && !security_code.accepts(text, e.start, e.end)
            {
                Some("short number without context")
            } else if rules.is_name_field(&e.entity_type)
                && emails
                    .iter()
                    .any(|&(s, end)| s <= e.start && e.end <= end)
            {
                Some("inside email address")
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    debug!(
                        "Filtered '{}' entity at [{}, {}): {}",
                        e.entity_type, e.start, e.end, reason
                    );
                    false
                }
                None => true,
            }
        })
        .collect()
}

fn starts_uppercase(value: &str) -> bool {
    value.chars().next().is_some_and(char::is_uppercase)
}
