use piiguard_pii::{DetectionSettings, MergeRules, TokenSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Secret used when none is configured; tokens made with it are not private
pub const DEV_SECRET_KEY: &str = "piiguard-dev-secret";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Salt mixed into every token digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Configuration store file; in-memory store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub detection: DetectionSettings,

    #[serde(default)]
    pub merge: MergeRules,

    #[serde(default)]
    pub tokens: TokenSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("PIIGUARD_SECRET_KEY") {
            self.secret_key = Some(val);
        }

        if let Some(val) = var("PIIGUARD_STORE") {
            self.store_path = Some(val);
        }

        if let Some(val) = var("PIIGUARD_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Some(val) = var("PIIGUARD_LANGUAGE") {
            self.detection.language_hint = val;
        }

        if let Some(val) = var("PIIGUARD_DETECTOR_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => self.detection.detector_timeout_ms = ms,
                Err(_) => eprintln!(
                    "Warning: Invalid PIIGUARD_DETECTOR_TIMEOUT_MS '{}', using {}",
                    val, self.detection.detector_timeout_ms
                ),
            }
        }
    }

    /// Configured secret, or the development default
    pub fn secret_key(&self) -> &str {
        self.secret_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEV_SECRET_KEY)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key() == DEV_SECRET_KEY
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.detection.security_code.lookback_chars, 40);
        assert_eq!(config.merge.name_merge_max_gap, 5);
        assert_eq!(config.tokens.digest_len, 16);
        assert!(config.uses_dev_secret());
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_partial_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            "secret_key: s3cret\nmerge:\n  name_merge_max_gap: 2\ndetection:\n  security_code:\n    lookback_chars: 10"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.secret_key(), "s3cret");
        assert_eq!(config.merge.name_merge_max_gap, 2);
        assert_eq!(config.merge.min_entity_chars, 2);
        assert_eq!(config.detection.security_code.lookback_chars, 10);
        assert!(!config.detection.security_code.triggers.is_empty());
        assert_eq!(config.detection.regex_confidence, 0.9);
    }

    #[test]
    fn test_toml_by_extension() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "store_path = \"guards.toml\"\n\n[logging]\nlevel = \"debug\"\n\n[tokens]\ndigest_len = 12"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.store_path.as_deref(), Some("guards.toml"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.tokens.digest_len, 12);
    }

    #[test]
    fn test_env_overrides_file() {
        let vars: HashMap<&str, &str> = [
            ("PIIGUARD_SECRET_KEY", "from-env"),
            ("PIIGUARD_LOG_LEVEL", "warn"),
            ("PIIGUARD_DETECTOR_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig {
            secret_key: Some("from-file".to_string()),
            ..Default::default()
        };
        config.merge_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.secret_key(), "from-env");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.detection.detector_timeout_ms, 2000);
    }

    #[test]
    fn test_empty_secret_falls_back() {
        let config = AppConfig {
            secret_key: Some(String::new()),
            ..Default::default()
        };
        assert!(config.uses_dev_secret());
    }
}
