//! Guard type configuration model
//!
//! A guard type is a named masking policy. Each guard type owns a set of
//! field definitions, and each field is detected by a shared regex pattern,
//! by an NER entity type, or by both.

use crate::entity::canonicalize;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Row identifier in the configuration store
pub type RowId = u64;

/// How a field is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Shared regex pattern only
    Regex,

    /// External NER detectors only
    Ner,

    /// Both regex and NER
    Hybrid,
}

impl DetectionMode {
    /// Whether this mode runs a regex pattern
    pub fn uses_pattern(self) -> bool {
        matches!(self, DetectionMode::Regex | DetectionMode::Hybrid)
    }

    /// Whether this mode queries NER detectors
    pub fn uses_ner(self) -> bool {
        matches!(self, DetectionMode::Ner | DetectionMode::Hybrid)
    }
}

impl std::str::FromStr for DetectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "regex" => Ok(DetectionMode::Regex),
            "ner" => Ok(DetectionMode::Ner),
            "hybrid" => Ok(DetectionMode::Hybrid),
            other => Err(Error::ConfigValidation(format!(
                "detection mode must be 'regex', 'ner' or 'hybrid', got '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DetectionMode::Regex => "regex",
            DetectionMode::Ner => "ner",
            DetectionMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// Named masking policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardType {
    pub id: RowId,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One detectable category within a guard type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: RowId,
    /// Name of the owning guard type
    pub guard_type: String,
    pub field_name: String,
    pub display_name: String,
    pub detection_mode: DetectionMode,
    #[serde(default)]
    pub pattern_ref: Option<String>,
    /// Stored in canonical form
    #[serde(default)]
    pub canonical_entity_type: Option<String>,
    #[serde(default)]
    pub example_value: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shared, named regex pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexPattern {
    pub id: RowId,
    pub name: String,
    pub display_name: String,
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    /// Subset of `i` (case-insensitive), `m` (multi-line), `s` (dot matches newline)
    #[serde(default = "default_flags")]
    pub flags: String,
    #[serde(default)]
    pub test_examples: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegexPattern {
    /// Compile this pattern with its flags
    pub fn compile(&self) -> Result<Regex> {
        compile_pattern(&self.name, &self.pattern, &self.flags)
    }
}

/// Compile a pattern source with a flag string (`i`, `m`, `s`)
pub fn compile_pattern(name: &str, source: &str, flags: &str) -> Result<Regex> {
    if let Some(bad) = flags.chars().find(|c| !matches!(*c, 'i' | 'm' | 's')) {
        return Err(Error::InvalidPattern {
            name: name.to_string(),
            reason: format!("unsupported flag '{}'", bad),
        });
    }

    RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| Error::InvalidPattern {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

/// Input for creating a guard type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGuardType {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewGuardType {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_key("guard type name", &self.name)?;
        if self.display_name.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "guard type display_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update of a guard type; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardTypeUpdate {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl GuardTypeUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.description.is_none()
            && self.icon.is_none()
            && self.color.is_none()
    }

    /// Apply to a row, returning whether anything changed
    pub fn apply(&self, guard: &mut GuardType) -> bool {
        let mut changed = false;
        changed |= assign(&mut guard.display_name, &self.display_name);
        changed |= assign(&mut guard.description, &self.description);
        changed |= assign(&mut guard.icon, &self.icon);
        changed |= assign(&mut guard.color, &self.color);
        changed
    }
}

/// Input for creating a field definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFieldDefinition {
    pub field_name: String,
    pub display_name: String,
    pub detection_mode: DetectionMode,
    #[serde(default)]
    pub pattern_ref: Option<String>,
    #[serde(default)]
    pub canonical_entity_type: Option<String>,
    #[serde(default)]
    pub example_value: String,
}

impl NewFieldDefinition {
    /// Regex-detected field bound to a shared pattern
    pub fn regex(
        field_name: impl Into<String>,
        display_name: impl Into<String>,
        pattern_ref: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            display_name: display_name.into(),
            detection_mode: DetectionMode::Regex,
            pattern_ref: Some(pattern_ref.into()),
            canonical_entity_type: None,
            example_value: String::new(),
        }
    }

    /// NER-detected field bound to an entity type
    pub fn ner(
        field_name: impl Into<String>,
        display_name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            display_name: display_name.into(),
            detection_mode: DetectionMode::Ner,
            pattern_ref: None,
            canonical_entity_type: Some(entity_type.into()),
            example_value: String::new(),
        }
    }

    /// Field detected by both a pattern and an entity type
    pub fn hybrid(
        field_name: impl Into<String>,
        display_name: impl Into<String>,
        pattern_ref: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            display_name: display_name.into(),
            detection_mode: DetectionMode::Hybrid,
            pattern_ref: Some(pattern_ref.into()),
            canonical_entity_type: Some(entity_type.into()),
            example_value: String::new(),
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example_value = example.into();
        self
    }

    /// Validate and normalize.
    ///
    /// `pattern_exists` answers whether an active pattern with the given name
    /// exists in the store. The returned definition carries the canonical
    /// entity label and drops references the mode does not use.
    pub fn validate(&self, pattern_exists: impl Fn(&str) -> bool) -> Result<ValidatedField> {
        validate_key("field_name", &self.field_name)?;
        let (pattern_ref, canonical_entity_type) = validate_rule(
            self.detection_mode,
            self.pattern_ref.as_deref(),
            self.canonical_entity_type.as_deref(),
            pattern_exists,
        )?;

        Ok(ValidatedField {
            field_name: self.field_name.trim().to_string(),
            display_name: if self.display_name.trim().is_empty() {
                self.field_name.trim().to_string()
            } else {
                self.display_name.clone()
            },
            detection_mode: self.detection_mode,
            pattern_ref,
            canonical_entity_type,
            example_value: self.example_value.clone(),
        })
    }
}

/// Field definition input after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedField {
    pub field_name: String,
    pub display_name: String,
    pub detection_mode: DetectionMode,
    pub pattern_ref: Option<String>,
    pub canonical_entity_type: Option<String>,
    pub example_value: String,
}

/// Partial update of a field definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDefinitionUpdate {
    pub display_name: Option<String>,
    pub detection_mode: Option<DetectionMode>,
    pub pattern_ref: Option<String>,
    pub canonical_entity_type: Option<String>,
    pub example_value: Option<String>,
}

impl FieldDefinitionUpdate {
    /// Whether the update can change which pattern the field runs
    pub fn touches_pattern(&self) -> bool {
        self.detection_mode.is_some() || self.pattern_ref.is_some()
    }

    /// Apply to a copy of `field`, re-validating the resulting rule
    pub fn apply(
        &self,
        field: &FieldDefinition,
        pattern_exists: impl Fn(&str) -> bool,
    ) -> Result<FieldDefinition> {
        let mut updated = field.clone();
        assign(&mut updated.display_name, &self.display_name);
        assign(&mut updated.example_value, &self.example_value);
        if let Some(mode) = self.detection_mode {
            updated.detection_mode = mode;
        }
        if self.pattern_ref.is_some() {
            updated.pattern_ref = self.pattern_ref.clone();
        }
        if self.canonical_entity_type.is_some() {
            updated.canonical_entity_type = self.canonical_entity_type.clone();
        }

        let (pattern_ref, canonical_entity_type) = validate_rule(
            updated.detection_mode,
            updated.pattern_ref.as_deref(),
            updated.canonical_entity_type.as_deref(),
            pattern_exists,
        )?;
        updated.pattern_ref = pattern_ref;
        updated.canonical_entity_type = canonical_entity_type;
        Ok(updated)
    }
}

/// Input for creating a regex pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegexPattern {
    pub name: String,
    pub display_name: String,
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_flags")]
    pub flags: String,
    #[serde(default)]
    pub test_examples: Vec<String>,
}

impl NewRegexPattern {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            pattern: pattern.into(),
            description: String::new(),
            flags: default_flags(),
            test_examples: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_examples = examples.into_iter().map(Into::into).collect();
        self
    }

    /// Check the key and that the pattern compiles.
    ///
    /// Returns the test examples the compiled pattern does not match; those
    /// are reported, not rejected.
    pub fn validate(&self) -> Result<Vec<String>> {
        validate_key("pattern name", &self.name)?;
        let regex = compile_pattern(&self.name, &self.pattern, &self.flags)?;
        Ok(unmatched_examples(&regex, &self.test_examples))
    }
}

/// Partial update of a regex pattern
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegexPatternUpdate {
    pub display_name: Option<String>,
    pub pattern: Option<String>,
    pub description: Option<String>,
    pub flags: Option<String>,
    pub test_examples: Option<Vec<String>>,
}

impl RegexPatternUpdate {
    /// Apply to a copy of `pattern`; the result must still compile
    pub fn apply(&self, pattern: &RegexPattern) -> Result<RegexPattern> {
        let mut updated = pattern.clone();
        assign(&mut updated.display_name, &self.display_name);
        assign(&mut updated.pattern, &self.pattern);
        assign(&mut updated.description, &self.description);
        assign(&mut updated.flags, &self.flags);
        if let Some(examples) = &self.test_examples {
            updated.test_examples = examples.clone();
        }
        updated.compile()?;
        Ok(updated)
    }
}

/// Test examples that the compiled pattern does not find
pub fn unmatched_examples(regex: &Regex, examples: &[String]) -> Vec<String> {
    examples
        .iter()
        .filter(|example| !regex.is_match(example))
        .cloned()
        .collect()
}

fn validate_rule(
    mode: DetectionMode,
    pattern_ref: Option<&str>,
    entity_type: Option<&str>,
    pattern_exists: impl Fn(&str) -> bool,
) -> Result<(Option<String>, Option<String>)> {
    let pattern_ref = if mode.uses_pattern() {
        let name = pattern_ref.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
            Error::ConfigValidation(format!("pattern_ref is required for {} fields", mode))
        })?;
        if !pattern_exists(name) {
            return Err(Error::PatternNotFound(name.to_string()));
        }
        Some(name.to_string())
    } else {
        None
    };

    let canonical_entity_type = if mode.uses_ner() {
        let label = entity_type.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            Error::ConfigValidation(format!(
                "canonical_entity_type is required for {} fields",
                mode
            ))
        })?;
        let canonical = canonicalize(label);
        if !canonical.is_known {
            debug!("Rejected unknown entity type '{}'", label);
            return Err(Error::UnknownEntityType(label.to_string()));
        }
        Some(canonical.label)
    } else {
        None
    };

    Ok((pattern_ref, canonical_entity_type))
}

fn validate_key(what: &str, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::ConfigValidation(format!("{} must not be empty", what)));
    }
    if key.contains(&['<', '>', ':'][..]) || key.chars().any(char::is_whitespace) {
        return Err(Error::ConfigValidation(format!(
            "{} '{}' must not contain whitespace, '<', '>' or ':'",
            what, key
        )));
    }
    Ok(())
}

fn assign(target: &mut String, value: &Option<String>) -> bool {
    match value {
        Some(v) if v != target => {
            *target = v.clone();
            true
        }
        _ => false,
    }
}

fn default_icon() -> String {
    "🛡️".to_string()
}

fn default_color() -> String {
    "#666666".to_string()
}

fn default_flags() -> String {
    "i".to_string()
}

impl GuardType {
    /// Build a fresh active row from validated input
    pub fn from_input(id: RowId, input: &NewGuardType, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.trim().to_string(),
            display_name: input.display_name.clone(),
            description: input.description.clone(),
            icon: input.icon.clone().unwrap_or_else(default_icon),
            color: input.color.clone().unwrap_or_else(default_color),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl FieldDefinition {
    /// Build a fresh active row from validated input
    pub fn from_validated(
        id: RowId,
        guard_type: &str,
        input: ValidatedField,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            guard_type: guard_type.to_string(),
            field_name: input.field_name,
            display_name: input.display_name,
            detection_mode: input.detection_mode,
            pattern_ref: input.pattern_ref,
            canonical_entity_type: input.canonical_entity_type,
            example_value: input.example_value,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl RegexPattern {
    /// Build a fresh active row from validated input
    pub fn from_input(id: RowId, input: &NewRegexPattern, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.trim().to_string(),
            display_name: input.display_name.clone(),
            pattern: input.pattern.clone(),
            description: input.description.clone(),
            flags: input.flags.clone(),
            test_examples: input.test_examples.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
