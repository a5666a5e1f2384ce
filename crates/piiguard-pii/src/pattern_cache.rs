//! Compiled regex pattern cache
//!
//! The cache holds an immutable [`PatternSnapshot`] behind an `Arc`. A reload
//! compiles a complete new snapshot and swaps it in; in-flight detections
//! keep the snapshot they started with.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use piiguard_core::{GuardConfigStore, RegexPattern, Result};
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Pattern sources that are nothing but a bare 3-4 digit run
static BARE_SHORT_DIGITS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?:\\b)?(?:\\d|\[0-9\])\{(?:3|4|3,4)\}(?:\\b)?$").ok()
});

/// Whether a pattern source only matches a bare 3 or 4 digit number
pub fn is_bare_short_digit(source: &str) -> bool {
    BARE_SHORT_DIGITS
        .as_ref()
        .is_some_and(|re| re.is_match(source.trim()))
}

/// A pattern ready to run
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub name: String,
    pub source: String,
    pub regex: Regex,
    /// Matches would be arbitrary short numbers unless context says otherwise
    pub is_bare_short_digit: bool,
}

impl CompiledPattern {
    pub fn compile(pattern: &RegexPattern) -> Result<Self> {
        Ok(Self {
            name: pattern.name.clone(),
            source: pattern.pattern.clone(),
            regex: pattern.compile()?,
            is_bare_short_digit: is_bare_short_digit(&pattern.pattern),
        })
    }
}

/// Immutable set of compiled patterns
#[derive(Debug, Default)]
pub struct PatternSnapshot {
    patterns: BTreeMap<String, Arc<CompiledPattern>>,
    /// Store version the snapshot was built from
    version: u64,
}

impl PatternSnapshot {
    pub fn get(&self, name: &str) -> Option<Arc<CompiledPattern>> {
        self.patterns.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Outcome of a reload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub compiled: usize,
    /// Names of patterns that failed to compile and were left out
    pub skipped: Vec<String>,
}

/// Copy-on-write cache of compiled patterns
#[derive(Debug, Default)]
pub struct PatternCache {
    current: RwLock<Arc<PatternSnapshot>>,
    /// Serializes reloads against each other
    reload_lock: Mutex<()>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; hold on to it for the duration of one detection
    pub fn snapshot(&self) -> Arc<PatternSnapshot> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Compiled pattern from the current snapshot
    pub fn get(&self, name: &str) -> Option<Arc<CompiledPattern>> {
        self.snapshot().get(name)
    }

    /// Rebuild the cache from a list of patterns.
    ///
    /// Inactive patterns are ignored. Patterns that fail to compile are
    /// logged and left out; they never fail the reload.
    pub fn reload(&self, patterns: &[RegexPattern], version: u64) -> ReloadReport {
        let mut report = ReloadReport::default();
        let mut compiled = BTreeMap::new();

        for pattern in patterns.iter().filter(|p| p.is_active) {
            match CompiledPattern::compile(pattern) {
                Ok(c) => {
                    compiled.insert(pattern.name.clone(), Arc::new(c));
                    report.compiled += 1;
                }
                Err(e) => {
                    warn!("Skipping pattern '{}': {}", pattern.name, e);
                    report.skipped.push(pattern.name.clone());
                }
            }
        }

        let snapshot = Arc::new(PatternSnapshot {
            patterns: compiled,
            version,
        });
        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *current = snapshot;
        }

        info!(
            "Pattern cache reloaded: {} compiled, {} skipped (version {})",
            report.compiled,
            report.skipped.len(),
            version
        );
        report
    }

    /// Reload from the configuration store
    pub async fn reload_from(&self, store: &dyn GuardConfigStore) -> Result<ReloadReport> {
        let _guard = self.reload_lock.lock().await;
        let version = store.version();
        let patterns = store.list_regex_patterns().await?;
        debug!("Reloading {} patterns from store", patterns.len());
        Ok(self.reload(&patterns, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use piiguard_core::guard::NewRegexPattern;

    fn pattern(name: &str, source: &str) -> RegexPattern {
        let input = NewRegexPattern::new(name, name, source).with_flags("");
        RegexPattern::from_input(1, &input, Utc::now())
    }

    #[test]
    fn test_bare_short_digit_detection() {
        assert!(is_bare_short_digit(r"\b\d{3,4}\b"));
        assert!(is_bare_short_digit(r"\d{3}"));
        assert!(is_bare_short_digit(r"\b[0-9]{4}\b"));
        assert!(!is_bare_short_digit(r"\b\d{8,16}\b"));
        assert!(!is_bare_short_digit(r"CVV\s*\d{3}"));
    }

    #[test]
    fn test_reload_skips_malformed_patterns() {
        let cache = PatternCache::new();
        let report = cache.reload(&[pattern("ok", r"\d+"), pattern("bad", "(")], 3);

        assert_eq!(report.compiled, 1);
        assert_eq!(report.skipped, vec!["bad".to_string()]);
        assert!(cache.get("ok").is_some());
        assert!(cache.get("bad").is_none());
        assert_eq!(cache.snapshot().version(), 3);
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let cache = PatternCache::new();
        cache.reload(&[pattern("cvv", r"\b\d{3,4}\b")], 1);
        let before = cache.snapshot();

        cache.reload(&[], 2);

        assert!(before.get("cvv").is_some_and(|p| p.is_bare_short_digit));
        assert!(cache.snapshot().is_empty());
    }
}
