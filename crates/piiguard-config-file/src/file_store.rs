//! File-based GuardConfigStore implementation

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use piiguard_core::{
    Error, Result,
    config_store::{GuardConfigStore, GuardSnapshot},
    guard::{
        FieldDefinition, FieldDefinitionUpdate, GuardType, GuardTypeUpdate, NewFieldDefinition,
        NewGuardType, NewRegexPattern, RegexPattern, RegexPatternUpdate, RowId,
    },
};

/// Every table of the configuration, serialized as one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigTables {
    #[serde(default)]
    next_id: RowId,
    #[serde(default)]
    guard_types: Vec<GuardType>,
    #[serde(default)]
    fields: Vec<FieldDefinition>,
    #[serde(default)]
    patterns: Vec<RegexPattern>,
}

impl ConfigTables {
    fn allocate_id(&mut self) -> RowId {
        self.next_id += 1;
        self.next_id
    }

    fn active_guard(&self, name: &str) -> Option<&GuardType> {
        self.guard_types
            .iter()
            .find(|g| g.name == name && g.is_active)
    }

    fn has_active_pattern(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.name == name && p.is_active)
    }

    fn active_fields_for(&self, guard_type: &str) -> Vec<FieldDefinition> {
        let mut fields: Vec<FieldDefinition> = self
            .fields
            .iter()
            .filter(|f| f.guard_type == guard_type && f.is_active)
            .cloned()
            .collect();
        fields.sort_by(|a, b| a.field_name.cmp(&b.field_name));
        fields
    }
}

/// File format of the backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Yaml,
    Toml,
}

impl FileFormat {
    fn for_path(path: &Path) -> Self {
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            FileFormat::Toml
        } else {
            FileFormat::Yaml
        }
    }
}

/// Configuration store keeping all rows in memory, optionally mirrored to a file
///
/// Every mutation is applied to a copy of the tables, written to disk, and
/// only then swapped in, so a failed write leaves the store unchanged.
#[derive(Debug)]
pub struct FileConfigStore {
    /// Backing file, `None` for a purely in-memory store
    path: Option<PathBuf>,
    tables: RwLock<ConfigTables>,
    /// Configuration version counter (incremented on each mutation)
    version: AtomicU64,
}

impl FileConfigStore {
    /// Create an empty store that is never persisted
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tables: RwLock::new(ConfigTables::default()),
            version: AtomicU64::new(0),
        }
    }

    /// Open (or create) a file-backed store
    ///
    /// # Arguments
    /// * `path` - YAML (`.yaml`/`.yml`) or TOML (`.toml`) file
    ///
    /// # Errors
    /// - `Error::Io` if the file can't be read or created
    /// - `Error::Config` if the file isn't valid YAML/TOML
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = expand_home(path.into())?;

        let tables = if path.exists() {
            read_tables(&path)?
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let tables = ConfigTables::default();
            write_tables(&path, &tables)?;
            info!("Created empty configuration store at {:?}", path);
            tables
        };

        info!(
            "Initialized FileConfigStore for {:?} ({} guard types, {} patterns)",
            path,
            tables.guard_types.len(),
            tables.patterns.len()
        );

        Ok(Self {
            path: Some(path),
            tables: RwLock::new(tables),
            version: AtomicU64::new(0),
        })
    }

    /// Backing file path, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `op` to a draft copy of the tables.
    ///
    /// `op` returns the value to hand back and whether it changed anything.
    /// Changed drafts are persisted before they replace the live tables.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut ConfigTables) -> Result<(T, bool)>,
    ) -> Result<T> {
        let mut tables = self.tables.write().await;
        let mut draft = tables.clone();
        let (value, changed) = op(&mut draft)?;

        if changed {
            if let Some(path) = &self.path {
                write_tables(path, &draft)?;
            }
            *tables = draft;
            self.version.fetch_add(1, Ordering::SeqCst);
        }

        Ok(value)
    }
}

#[async_trait]
impl GuardConfigStore for FileConfigStore {
    async fn create_guard_type(&self, input: NewGuardType) -> Result<RowId> {
        input.validate()?;
        let name = input.name.trim().to_string();

        self.mutate(|tables| {
            let now = Utc::now();
            if let Some(existing) = tables.guard_types.iter_mut().find(|g| g.name == name) {
                if existing.is_active {
                    debug!("Guard type '{}' already exists (id={})", name, existing.id);
                    return Ok((existing.id, false));
                }
                existing.is_active = true;
                existing.updated_at = now;
                info!("Reactivated guard type '{}' (id={})", name, existing.id);
                return Ok((existing.id, true));
            }

            let id = tables.allocate_id();
            tables.guard_types.push(GuardType::from_input(id, &input, now));
            info!("Created guard type '{}' (id={})", name, id);
            Ok((id, true))
        })
        .await
    }

    async fn update_guard_type(&self, name: &str, update: GuardTypeUpdate) -> Result<bool> {
        self.mutate(|tables| {
            let guard = tables
                .guard_types
                .iter_mut()
                .find(|g| g.name == name && g.is_active)
                .ok_or_else(|| Error::GuardTypeNotFound(name.to_string()))?;

            let changed = update.apply(guard);
            if changed {
                guard.updated_at = Utc::now();
                info!("Updated guard type '{}'", name);
            }
            Ok((changed, changed))
        })
        .await
    }

    async fn deactivate_guard_type(&self, name: &str) -> Result<()> {
        self.mutate(|tables| {
            let now = Utc::now();
            let guard = tables
                .guard_types
                .iter_mut()
                .find(|g| g.name == name)
                .ok_or_else(|| Error::GuardTypeNotFound(name.to_string()))?;

            if !guard.is_active {
                return Ok(((), false));
            }
            guard.is_active = false;
            guard.updated_at = now;

            let mut cascaded = 0;
            for field in tables
                .fields
                .iter_mut()
                .filter(|f| f.guard_type == name && f.is_active)
            {
                field.is_active = false;
                field.updated_at = now;
                cascaded += 1;
            }

            info!(
                "Deactivated guard type '{}' and {} of its fields",
                name, cascaded
            );
            Ok(((), true))
        })
        .await
    }

    async fn get_guard_type(&self, name: &str) -> Result<GuardType> {
        let tables = self.tables.read().await;
        tables
            .active_guard(name)
            .cloned()
            .ok_or_else(|| Error::GuardTypeNotFound(name.to_string()))
    }

    async fn list_guard_types(&self) -> Result<Vec<GuardType>> {
        let tables = self.tables.read().await;
        let mut guards: Vec<GuardType> = tables
            .guard_types
            .iter()
            .filter(|g| g.is_active)
            .cloned()
            .collect();
        guards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(guards)
    }

    async fn create_field_definition(
        &self,
        guard_type: &str,
        input: NewFieldDefinition,
    ) -> Result<RowId> {
        self.mutate(|tables| {
            if tables.active_guard(guard_type).is_none() {
                return Err(Error::GuardTypeNotFound(guard_type.to_string()));
            }
            let validated = input.validate(|pattern| tables.has_active_pattern(pattern))?;
            let now = Utc::now();

            if let Some(existing) = tables
                .fields
                .iter_mut()
                .find(|f| f.guard_type == guard_type && f.field_name == validated.field_name)
            {
                if existing.is_active {
                    debug!(
                        "Field '{}' already exists on '{}' (id={})",
                        existing.field_name, guard_type, existing.id
                    );
                    return Ok((existing.id, false));
                }

                let id = existing.id;
                let created_at = existing.created_at;
                *existing = FieldDefinition::from_validated(id, guard_type, validated, now);
                existing.created_at = created_at;
                info!(
                    "Reactivated field '{}' on '{}' (id={})",
                    existing.field_name, guard_type, id
                );
                return Ok((id, true));
            }

            let id = tables.allocate_id();
            let field = FieldDefinition::from_validated(id, guard_type, validated, now);
            info!(
                "Created {} field '{}' on '{}' (id={})",
                field.detection_mode, field.field_name, guard_type, id
            );
            tables.fields.push(field);
            Ok((id, true))
        })
        .await
    }

    async fn update_field_definition(
        &self,
        field_id: RowId,
        update: FieldDefinitionUpdate,
    ) -> Result<bool> {
        self.mutate(|tables| {
            let current = tables
                .fields
                .iter()
                .find(|f| f.id == field_id && f.is_active)
                .ok_or_else(|| Error::FieldNotFound(field_id.to_string()))?;

            let mut updated = update.apply(current, |pattern| tables.has_active_pattern(pattern))?;
            if updated == *current {
                return Ok((false, false));
            }
            updated.updated_at = Utc::now();

            if let Some(slot) = tables.fields.iter_mut().find(|f| f.id == field_id) {
                info!("Updated field '{}' (id={})", updated.field_name, field_id);
                *slot = updated;
            }
            Ok((true, true))
        })
        .await
    }

    async fn deactivate_field_definition(&self, field_id: RowId) -> Result<()> {
        self.mutate(|tables| {
            let field = tables
                .fields
                .iter_mut()
                .find(|f| f.id == field_id)
                .ok_or_else(|| Error::FieldNotFound(field_id.to_string()))?;

            if !field.is_active {
                return Ok(((), false));
            }
            field.is_active = false;
            field.updated_at = Utc::now();
            info!(
                "Deactivated field '{}' on '{}' (id={})",
                field.field_name, field.guard_type, field_id
            );
            Ok(((), true))
        })
        .await
    }

    async fn list_active_fields_for(&self, guard_type: &str) -> Result<Vec<FieldDefinition>> {
        let tables = self.tables.read().await;
        if tables.active_guard(guard_type).is_none() {
            return Err(Error::GuardTypeNotFound(guard_type.to_string()));
        }
        Ok(tables.active_fields_for(guard_type))
    }

    async fn create_regex_pattern(&self, input: NewRegexPattern) -> Result<RowId> {
        let unmatched = input.validate()?;
        for example in &unmatched {
            warn!(
                "Pattern '{}' does not match its own test example {:?}",
                input.name, example
            );
        }
        let name = input.name.trim().to_string();

        self.mutate(|tables| {
            let now = Utc::now();
            if let Some(existing) = tables.patterns.iter_mut().find(|p| p.name == name) {
                if existing.is_active {
                    debug!("Pattern '{}' already exists (id={})", name, existing.id);
                    return Ok((existing.id, false));
                }

                let id = existing.id;
                let created_at = existing.created_at;
                *existing = RegexPattern::from_input(id, &input, now);
                existing.created_at = created_at;
                info!("Reactivated pattern '{}' (id={})", name, id);
                return Ok((id, true));
            }

            let id = tables.allocate_id();
            tables.patterns.push(RegexPattern::from_input(id, &input, now));
            info!("Created pattern '{}' (id={})", name, id);
            Ok((id, true))
        })
        .await
    }

    async fn update_regex_pattern(&self, name: &str, update: RegexPatternUpdate) -> Result<bool> {
        self.mutate(|tables| {
            let pattern = tables
                .patterns
                .iter_mut()
                .find(|p| p.name == name && p.is_active)
                .ok_or_else(|| Error::PatternNotFound(name.to_string()))?;

            let mut updated = update.apply(pattern)?;
            if updated == *pattern {
                return Ok((false, false));
            }
            updated.updated_at = Utc::now();
            *pattern = updated;
            info!("Updated pattern '{}'", name);
            Ok((true, true))
        })
        .await
    }

    async fn deactivate_regex_pattern(&self, name: &str) -> Result<()> {
        self.mutate(|tables| {
            let pattern = tables
                .patterns
                .iter_mut()
                .find(|p| p.name == name)
                .ok_or_else(|| Error::PatternNotFound(name.to_string()))?;

            if !pattern.is_active {
                return Ok(((), false));
            }
            pattern.is_active = false;
            pattern.updated_at = Utc::now();

            let dependents = tables
                .fields
                .iter()
                .filter(|f| f.is_active && f.pattern_ref.as_deref() == Some(name))
                .count();
            if dependents > 0 {
                warn!(
                    "Deactivated pattern '{}' is still referenced by {} active fields",
                    name, dependents
                );
            } else {
                info!("Deactivated pattern '{}'", name);
            }
            Ok(((), true))
        })
        .await
    }

    async fn get_regex_pattern(&self, name: &str) -> Result<RegexPattern> {
        let tables = self.tables.read().await;
        tables
            .patterns
            .iter()
            .find(|p| p.name == name && p.is_active)
            .cloned()
            .ok_or_else(|| Error::PatternNotFound(name.to_string()))
    }

    async fn list_regex_patterns(&self) -> Result<Vec<RegexPattern>> {
        let tables = self.tables.read().await;
        let mut patterns: Vec<RegexPattern> = tables
            .patterns
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        patterns.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(patterns)
    }

    async fn guard_snapshot(&self, guard_type: &str) -> Result<GuardSnapshot> {
        let tables = self.tables.read().await;
        let guard = tables
            .active_guard(guard_type)
            .cloned()
            .ok_or_else(|| Error::GuardTypeNotFound(guard_type.to_string()))?;

        Ok(GuardSnapshot {
            fields: tables.active_fields_for(guard_type),
            guard,
            version: self.version(),
        })
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

fn expand_home(path: PathBuf) -> Result<PathBuf> {
    if !path.starts_with("~") {
        return Ok(path);
    }
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
    match path.strip_prefix("~") {
        Ok(rest) => Ok(home.join(rest)),
        Err(_) => Ok(path),
    }
}

fn read_tables(path: &Path) -> Result<ConfigTables> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        error!("Failed to read configuration store: {}", e);
        Error::Io(e)
    })?;

    if contents.trim().is_empty() {
        return Ok(ConfigTables::default());
    }

    let tables = match FileFormat::for_path(path) {
        FileFormat::Toml => toml::from_str(&contents).map_err(|e| {
            error!("Failed to parse TOML store: {}", e);
            Error::Config(format!("Invalid TOML: {}", e))
        })?,
        FileFormat::Yaml => serde_yaml::from_str(&contents).map_err(|e| {
            error!("Failed to parse YAML store: {}", e);
            Error::Config(format!("Invalid YAML: {}", e))
        })?,
    };

    debug!("Successfully read configuration store");
    Ok(tables)
}

/// Write via a sibling temp file and rename so readers never see a partial file
fn write_tables(path: &Path, tables: &ConfigTables) -> Result<()> {
    let contents = match FileFormat::for_path(path) {
        FileFormat::Toml => toml::to_string_pretty(tables).map_err(|e| {
            error!("Failed to serialize TOML store: {}", e);
            Error::Config(format!("TOML serialization error: {}", e))
        })?,
        FileFormat::Yaml => serde_yaml::to_string(tables).map_err(|e| {
            error!("Failed to serialize YAML store: {}", e);
            Error::Config(format!("YAML serialization error: {}", e))
        })?,
    };

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, contents).map_err(|e| {
        error!("Failed to write configuration store: {}", e);
        Error::Io(e)
    })?;
    std::fs::rename(&tmp_path, path)?;

    debug!("Persisted configuration store to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use piiguard_core::guard::DetectionMode;
    use tempfile::TempDir;

    async fn store_with_email() -> FileConfigStore {
        let store = FileConfigStore::in_memory();
        store
            .create_regex_pattern(NewRegexPattern::new(
                "email",
                "E-mail",
                r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            ))
            .await
            .unwrap();
        store
            .create_guard_type(NewGuardType::new("InfoPerso", "Contact"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_field_is_idempotent() {
        let store = store_with_email().await;
        let field = NewFieldDefinition::regex("email", "E-mail", "email");

        let first = store
            .create_field_definition("InfoPerso", field.clone())
            .await
            .unwrap();
        let second = store
            .create_field_definition("InfoPerso", field)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_active_fields_for("InfoPerso").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_guard_type_is_idempotent() {
        let store = FileConfigStore::in_memory();
        let a = store
            .create_guard_type(NewGuardType::new("TypeA", "Identité"))
            .await
            .unwrap();
        let version = store.version();
        let b = store
            .create_guard_type(NewGuardType::new("TypeA", "Identité"))
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(store.version(), version, "no-op create must not bump version");
        assert_eq!(store.list_guard_types().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_field_on_unknown_guard_type() {
        let store = store_with_email().await;
        let result = store
            .create_field_definition("Missing", NewFieldDefinition::regex("email", "E-mail", "email"))
            .await;
        assert!(matches!(result, Err(Error::GuardTypeNotFound(_))));
    }

    #[tokio::test]
    async fn test_field_with_unknown_pattern_or_entity() {
        let store = store_with_email().await;

        let result = store
            .create_field_definition("InfoPerso", NewFieldDefinition::regex("phone", "Tél", "nope"))
            .await;
        assert!(matches!(result, Err(Error::PatternNotFound(_))));

        let result = store
            .create_field_definition("InfoPerso", NewFieldDefinition::ner("shoe", "Shoe", "SHOE"))
            .await;
        assert!(matches!(result, Err(Error::UnknownEntityType(_))));

        assert!(store.list_active_fields_for("InfoPerso").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_not_persisted() {
        let store = FileConfigStore::in_memory();
        let result = store
            .create_regex_pattern(NewRegexPattern::new("broken", "Broken", "(unclosed"))
            .await;
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
        assert!(store.list_regex_patterns().await.unwrap().is_empty());
        assert_eq!(store.version(), 0);
    }

    #[tokio::test]
    async fn test_deactivate_guard_type_cascades() {
        let store = store_with_email().await;
        let field_id = store
            .create_field_definition("InfoPerso", NewFieldDefinition::regex("email", "E-mail", "email"))
            .await
            .unwrap();

        store.deactivate_guard_type("InfoPerso").await.unwrap();

        assert!(matches!(
            store.get_guard_type("InfoPerso").await,
            Err(Error::GuardTypeNotFound(_))
        ));
        assert!(matches!(
            store.list_active_fields_for("InfoPerso").await,
            Err(Error::GuardTypeNotFound(_))
        ));
        assert!(matches!(
            store.update_field_definition(field_id, FieldDefinitionUpdate::default()).await,
            Err(Error::FieldNotFound(_))
        ));

        // Deactivating twice is a no-op
        store.deactivate_guard_type("InfoPerso").await.unwrap();
    }

    #[tokio::test]
    async fn test_recreating_soft_deleted_rows_keeps_ids() {
        let store = store_with_email().await;
        let guard_id = store.get_guard_type("InfoPerso").await.unwrap().id;
        let field = NewFieldDefinition::regex("email", "E-mail", "email");
        let field_id = store
            .create_field_definition("InfoPerso", field.clone())
            .await
            .unwrap();

        store.deactivate_guard_type("InfoPerso").await.unwrap();

        let again = store
            .create_guard_type(NewGuardType::new("InfoPerso", "Contact"))
            .await
            .unwrap();
        assert_eq!(again, guard_id);
        assert!(store.list_active_fields_for("InfoPerso").await.unwrap().is_empty());

        let field_again = store
            .create_field_definition("InfoPerso", field)
            .await
            .unwrap();
        assert_eq!(field_again, field_id);
    }

    #[tokio::test]
    async fn test_reads_are_sorted_by_name() {
        let store = FileConfigStore::in_memory();
        for name in ["TypeB", "InfoPerso", "TypeA"] {
            store
                .create_guard_type(NewGuardType::new(name, name))
                .await
                .unwrap();
        }
        let names: Vec<String> = store
            .list_guard_types()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["InfoPerso", "TypeA", "TypeB"]);

        for field in ["zeta", "alpha", "mid"] {
            store
                .create_field_definition("TypeA", NewFieldDefinition::ner(field, field, "PERSON"))
                .await
                .unwrap();
        }
        let snapshot = store.guard_snapshot("TypeA").await.unwrap();
        assert_eq!(snapshot.field_names(), vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_update_field_definition() {
        let store = store_with_email().await;
        let id = store
            .create_field_definition("InfoPerso", NewFieldDefinition::regex("email", "E-mail", "email"))
            .await
            .unwrap();

        let changed = store
            .update_field_definition(
                id,
                FieldDefinitionUpdate {
                    detection_mode: Some(DetectionMode::Hybrid),
                    canonical_entity_type: Some("mail".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(changed);

        let fields = store.list_active_fields_for("InfoPerso").await.unwrap();
        assert_eq!(fields[0].detection_mode, DetectionMode::Hybrid);
        assert_eq!(fields[0].canonical_entity_type.as_deref(), Some("EMAIL_ADDRESS"));

        let unchanged = store
            .update_field_definition(id, FieldDefinitionUpdate::default())
            .await
            .unwrap();
        assert!(!unchanged);
    }

    #[tokio::test]
    async fn test_update_guard_type_partial() {
        let store = store_with_email().await;
        let changed = store
            .update_guard_type(
                "InfoPerso",
                GuardTypeUpdate {
                    color: Some("#3498db".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(changed);

        let guard = store.get_guard_type("InfoPerso").await.unwrap();
        assert_eq!(guard.color, "#3498db");
        assert_eq!(guard.display_name, "Contact");
    }

    #[tokio::test]
    async fn test_pattern_lifecycle() {
        let store = store_with_email().await;
        let changed = store
            .update_regex_pattern(
                "email",
                RegexPatternUpdate {
                    flags: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(store.get_regex_pattern("email").await.unwrap().flags, "");

        let bad = store
            .update_regex_pattern(
                "email",
                RegexPatternUpdate {
                    pattern: Some("[".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(bad, Err(Error::InvalidPattern { .. })));

        store.deactivate_regex_pattern("email").await.unwrap();
        assert!(matches!(
            store.get_regex_pattern("email").await,
            Err(Error::PatternNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_yaml_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guards.yaml");

        {
            let store = FileConfigStore::open(&path).await.unwrap();
            store
                .create_regex_pattern(NewRegexPattern::new("cvv_3_4", "CVV", r"\b\d{3,4}\b"))
                .await
                .unwrap();
            store
                .create_guard_type(NewGuardType::new("TypeB", "Finance"))
                .await
                .unwrap();
            store
                .create_field_definition("TypeB", NewFieldDefinition::regex("cvv", "CVV", "cvv_3_4"))
                .await
                .unwrap();
        }

        let reopened = FileConfigStore::open(&path).await.unwrap();
        let fields = reopened.list_active_fields_for("TypeB").await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].pattern_ref.as_deref(), Some("cvv_3_4"));

        // Ids keep increasing after reopen
        let id = reopened
            .create_guard_type(NewGuardType::new("TypeA", "Identité"))
            .await
            .unwrap();
        assert!(id > fields[0].id);
    }

    #[tokio::test]
    async fn test_toml_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guards.toml");

        {
            let store = FileConfigStore::open(&path).await.unwrap();
            store
                .create_guard_type(NewGuardType::new("TypeA", "Identité"))
                .await
                .unwrap();
            store
                .create_field_definition("TypeA", NewFieldDefinition::ner("name", "Nom", "PERSON"))
                .await
                .unwrap();
        }

        let reopened = FileConfigStore::open(&path).await.unwrap();
        let fields = reopened.list_active_fields_for("TypeA").await.unwrap();
        assert_eq!(fields[0].canonical_entity_type.as_deref(), Some("PERSON"));
        assert_eq!(fields[0].pattern_ref, None);
    }

    #[tokio::test]
    async fn test_invalid_store_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guards.yaml");
        std::fs::write(&path, "guard_types: [unclosed").unwrap();

        let result = FileConfigStore::open(&path).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
