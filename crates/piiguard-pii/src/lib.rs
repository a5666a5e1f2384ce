//! PiiGuard PII Detection and Masking
//!
//! This crate turns free text into a masked document that is safe to send to
//! a third-party model, and restores the originals in the model's reply:
//! - Pattern cache of compiled, operator-configured regexes
//! - Detection orchestrator over regex rules and pluggable NER detectors
//! - Conflict resolution and merge engine producing disjoint entities
//! - Deterministic `<field:TOKEN_xxx>` tokenization and unmasking
//! - `GuardService`, the caller-facing API

pub mod candidate;
pub mod context;
pub mod detector;
pub mod merge;
pub mod orchestrator;
pub mod pattern_cache;
pub mod rules;
pub mod service;
pub mod tokenizer;

pub use candidate::{CandidateEntity, Source};
pub use context::SecurityCodeRules;
pub use detector::{EntityDetector, NameListDetector, RawSpan};
pub use merge::{MergeRules, UnificationGroup};
pub use orchestrator::{DetectionOrchestrator, DetectionSettings};
pub use pattern_cache::{CompiledPattern, PatternCache, PatternSnapshot, ReloadReport};
pub use rules::{ActiveField, FieldRule};
pub use service::{GuardService, ProcessOutcome, LLM_INSTRUCTION};
pub use tokenizer::{MaskedDocument, TokenManager, TokenSettings};
