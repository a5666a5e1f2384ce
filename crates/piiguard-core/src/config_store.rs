//! Configuration store trait
//!
//! The `GuardConfigStore` trait is the CRUD surface over guard types, field
//! definitions and shared regex patterns. The storage engine behind it is an
//! implementation detail.
//!
//! All implementations follow the same rules:
//! - rows are never hard-deleted; deactivation flips `is_active`
//! - creating a row whose unique key already exists returns the existing id
//! - reads only return active rows, ordered by name
//! - every mutation bumps `version()`

use async_trait::async_trait;

use crate::guard::{
    FieldDefinition, FieldDefinitionUpdate, GuardType, GuardTypeUpdate, NewFieldDefinition,
    NewGuardType, NewRegexPattern, RegexPattern, RegexPatternUpdate, RowId,
};
use crate::Result;

/// A guard type and its active fields, read atomically.
///
/// One `detect()` call works on a single snapshot so it never observes a
/// guard type halfway through an update.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardSnapshot {
    pub guard: GuardType,
    /// Active fields ordered by `field_name`
    pub fields: Vec<FieldDefinition>,
    /// Store version the snapshot was read at
    pub version: u64,
}

impl GuardSnapshot {
    /// Field names in deterministic order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field_name.as_str()).collect()
    }
}

/// Configuration store trait
///
/// # Example
/// ```no_run
/// # use piiguard_core::config_store::GuardConfigStore;
/// # use piiguard_core::guard::{NewFieldDefinition, NewGuardType};
/// # async fn example(store: &dyn GuardConfigStore) -> piiguard_core::Result<()> {
/// store.create_guard_type(NewGuardType::new("InfoPerso", "Contact")).await?;
/// let id = store
///     .create_field_definition("InfoPerso", NewFieldDefinition::ner("company", "Entreprise", "ORG"))
///     .await?;
/// // Re-running the same setup is safe
/// let again = store
///     .create_field_definition("InfoPerso", NewFieldDefinition::ner("company", "Entreprise", "ORG"))
///     .await?;
/// assert_eq!(id, again);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait GuardConfigStore: Send + Sync {
    /// Create a guard type, or return the id of the existing one
    ///
    /// # Errors
    /// - `Error::ConfigValidation` if the name or display name is invalid
    async fn create_guard_type(&self, input: NewGuardType) -> Result<RowId>;

    /// Apply a partial update; returns whether anything changed
    ///
    /// # Errors
    /// - `Error::GuardTypeNotFound` if no active guard type has this name
    async fn update_guard_type(&self, name: &str, update: GuardTypeUpdate) -> Result<bool>;

    /// Soft-delete a guard type and all of its fields
    async fn deactivate_guard_type(&self, name: &str) -> Result<()>;

    /// Look up an active guard type
    async fn get_guard_type(&self, name: &str) -> Result<GuardType>;

    /// All active guard types ordered by name
    async fn list_guard_types(&self) -> Result<Vec<GuardType>>;

    /// Create a field on a guard type, or return the id of the existing one
    ///
    /// # Errors
    /// - `Error::GuardTypeNotFound` if the guard type is missing or inactive
    /// - `Error::PatternNotFound` if a regex/hybrid field names an unknown pattern
    /// - `Error::UnknownEntityType` if a ner/hybrid field names an unknown entity type
    async fn create_field_definition(
        &self,
        guard_type: &str,
        input: NewFieldDefinition,
    ) -> Result<RowId>;

    /// Apply a partial update to a field; returns whether anything changed
    ///
    /// # Errors
    /// - `Error::FieldNotFound` if no active field has this id
    async fn update_field_definition(
        &self,
        field_id: RowId,
        update: FieldDefinitionUpdate,
    ) -> Result<bool>;

    /// Soft-delete a field
    async fn deactivate_field_definition(&self, field_id: RowId) -> Result<()>;

    /// Active fields of a guard type ordered by field name
    async fn list_active_fields_for(&self, guard_type: &str) -> Result<Vec<FieldDefinition>>;

    /// Create a shared pattern, or return the id of the existing one
    ///
    /// # Errors
    /// - `Error::InvalidPattern` if the pattern does not compile
    async fn create_regex_pattern(&self, input: NewRegexPattern) -> Result<RowId>;

    /// Apply a partial update to a pattern; returns whether anything changed
    async fn update_regex_pattern(&self, name: &str, update: RegexPatternUpdate) -> Result<bool>;

    /// Soft-delete a pattern
    async fn deactivate_regex_pattern(&self, name: &str) -> Result<()>;

    /// Look up an active pattern
    async fn get_regex_pattern(&self, name: &str) -> Result<RegexPattern>;

    /// All active patterns ordered by name
    async fn list_regex_patterns(&self) -> Result<Vec<RegexPattern>>;

    /// Guard type plus its active fields, read under one lock
    async fn guard_snapshot(&self, guard_type: &str) -> Result<GuardSnapshot>;

    /// Monotonic counter bumped by every mutation
    fn version(&self) -> u64;
}
