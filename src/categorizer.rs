//! Rule-based transaction categorization.
//!
//! A [`Categorizer`] owns the pattern set behind a read/write lock:
//! suggestions take the shared side, while loading, editing and feedback
//! take the exclusive side so a save always sees a consistent snapshot.

pub mod matcher;
pub mod pattern;
pub mod store;
pub mod suggestion;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};

use crate::error::{QuillError, Result};
use crate::models::Transaction;
use crate::settings::Settings;

pub use matcher::{blended_confidence, MatcherConfig, PatternMatcher, RankedPatterns};
pub use pattern::{Field, Pattern, PatternStatistics};
pub use store::{PatternStore, StoreConfig};
pub use suggestion::{Alternative, Suggestion, SuggestionSource};

#[derive(Debug)]
struct State {
    settings: Settings,
    matcher: PatternMatcher,
}

impl State {
    fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            early_exit_threshold: self.settings.categorization.confidence_threshold,
            ..MatcherConfig::default()
        }
    }
}

#[derive(Debug)]
pub struct Categorizer {
    store: PatternStore,
    state: RwLock<State>,
}

impl Categorizer {
    /// Build a categorizer, loading the configured pattern file if any. A
    /// missing pattern file leaves the set empty.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_store(settings, PatternStore::new())
    }

    pub fn with_store(settings: Settings, store: PatternStore) -> Result<Self> {
        let config = MatcherConfig {
            early_exit_threshold: settings.categorization.confidence_threshold,
            ..MatcherConfig::default()
        };
        let patterns_file = settings.files.patterns_file.clone();
        let categorizer = Self {
            store,
            state: RwLock::new(State {
                settings,
                matcher: PatternMatcher::with_config(Vec::new(), config),
            }),
        };

        if let Some(path) = patterns_file {
            match categorizer.load_patterns(&path) {
                Ok(()) => {}
                Err(QuillError::PatternsFileNotFound(path)) => {
                    warn!("patterns file {} not found, starting with no patterns", path.display());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(categorizer)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole pattern set with the contents of `path`.
    pub fn load_patterns(&self, path: &Path) -> Result<()> {
        let patterns = self.store.load_file(path)?;
        let mut state = self.write();
        let config = state.matcher_config();
        state.matcher = PatternMatcher::with_config(patterns, config);
        Ok(())
    }

    pub fn reload_patterns(&self) -> Result<()> {
        let path = self
            .patterns_file()
            .ok_or_else(|| QuillError::Other("no patterns file configured".into()))?;
        self.load_patterns(&path)
    }

    pub fn patterns_file(&self) -> Option<PathBuf> {
        self.read().settings.files.patterns_file.clone()
    }

    /// Best suggestion for `tx`, or `None` when disabled or nothing matches.
    pub fn suggest(&self, tx: &Arc<Transaction>) -> Option<Suggestion> {
        let state = self.read();
        if !state.settings.categorization.enabled {
            return None;
        }
        state.matcher.best_match(tx)
    }

    /// Every matching suggestion for `tx`; empty when disabled.
    pub fn suggest_all(&self, tx: &Arc<Transaction>) -> Vec<Suggestion> {
        let state = self.read();
        if !state.settings.categorization.enabled {
            return Vec::new();
        }
        state.matcher.match_all(tx)
    }

    /// Record whether `suggestion` was accepted. Suggestions without an
    /// originating pattern are ignored.
    ///
    /// With learning enabled the full pattern set is written back. A failed
    /// write is returned, but the in-memory statistics keep the update.
    pub fn feedback(&self, suggestion: &Suggestion, accepted: bool) -> Result<()> {
        let Some(id) = suggestion.pattern_id() else {
            return Ok(());
        };

        let mut state = self.write();
        state.matcher.update_statistics(id, accepted)?;

        let learn = state.settings.categorization.learn_from_edits;
        if let (true, Some(path)) = (learn, state.settings.files.patterns_file.as_deref()) {
            self.store.save_file(path, state.matcher.patterns())?;
        }
        Ok(())
    }

    pub fn save_patterns(&self, path: &Path) -> Result<()> {
        let state = self.read();
        self.store.save_file(path, state.matcher.patterns())
    }

    pub fn add_pattern(&self, pattern: Pattern) -> Result<()> {
        let mut state = self.write();
        if state.matcher.get(&pattern.id).is_some() {
            return Err(QuillError::DuplicatePattern(pattern.id));
        }
        info!("adding pattern '{}'", pattern.id);
        state.matcher.add(pattern);
        Ok(())
    }

    pub fn remove_pattern(&self, id: &str) -> Result<()> {
        let mut state = self.write();
        state
            .matcher
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| QuillError::NotFound(format!("pattern not found: {id}")))
    }

    pub fn get_pattern(&self, id: &str) -> Result<Pattern> {
        self.read()
            .matcher
            .get(id)
            .cloned()
            .ok_or_else(|| QuillError::NotFound(format!("pattern not found: {id}")))
    }

    /// Copy of every pattern, in load order.
    pub fn patterns(&self) -> Vec<Pattern> {
        self.read().matcher.patterns().to_vec()
    }

    pub fn pattern_count(&self) -> usize {
        self.read().matcher.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.read().settings.categorization.enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.write().settings.categorization.enabled = enabled;
    }

    pub fn settings(&self) -> Settings {
        self.read().settings.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::thread;

    const PATTERNS: &str = r#"
version: "1"
patterns:
  - id: starbucks
    name: Starbucks
    pattern: "STARBUCKS"
    category: Expenses:Food:DiningOut
    fields: [payee]
    priority: 10
    confidence: 0.9
  - id: coffee
    name: Coffee
    pattern: "(?i)coffee"
    category: Expenses:Food:Coffee
    fields: [narration]
    priority: 5
    confidence: 0.7
"#;

    fn tx(payee: &str, narration: &str) -> Arc<Transaction> {
        Arc::new(Transaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            Some(payee),
            narration,
        ))
    }

    fn settings_with(path: Option<PathBuf>, threshold: f64, learn: bool) -> Settings {
        let mut settings = Settings::default();
        settings.files.patterns_file = path;
        settings.categorization.confidence_threshold = threshold;
        settings.categorization.learn_from_edits = learn;
        settings
    }

    fn setup(threshold: f64, learn: bool) -> (tempfile::TempDir, PathBuf, Categorizer) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.yaml");
        std::fs::write(&path, PATTERNS).unwrap();
        let c = Categorizer::new(settings_with(Some(path.clone()), threshold, learn)).unwrap();
        (dir, path, c)
    }

    #[test]
    fn test_missing_patterns_file_at_construction_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let c = Categorizer::new(settings_with(Some(path), 0.8, true)).unwrap();
        assert_eq!(c.pattern_count(), 0);
        assert!(c.suggest(&tx("STARBUCKS", "coffee")).is_none());
        assert!(matches!(
            c.reload_patterns(),
            Err(QuillError::PatternsFileNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_patterns_file_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.yaml");
        std::fs::write(&path, "patterns:\n  - id: x\n").unwrap();
        assert!(Categorizer::new(settings_with(Some(path), 0.8, true)).is_err());
    }

    #[test]
    fn test_suggest_scenario() {
        let (_dir, _path, c) = setup(0.95, false);
        let s = c.suggest(&tx("STARBUCKS #12345", "Morning coffee")).unwrap();
        assert_eq!(s.category, "Expenses:Food:DiningOut");
        let alts: Vec<_> = s.alternatives.iter().map(|a| a.category.as_str()).collect();
        assert_eq!(alts, ["Expenses:Food:Coffee"]);
    }

    #[test]
    fn test_threshold_from_settings_drives_early_exit() {
        let (_dir, _path, c) = setup(0.8, false);
        let s = c.suggest(&tx("STARBUCKS #12345", "Morning coffee")).unwrap();
        assert!(s.alternatives.is_empty());
        assert_eq!(c.suggest_all(&tx("STARBUCKS #12345", "Morning coffee")).len(), 2);
    }

    #[test]
    fn test_disabled_returns_nothing() {
        let (_dir, _path, c) = setup(0.8, false);
        c.set_enabled(false);
        assert!(!c.is_enabled());
        assert!(!c.settings().categorization.enabled);
        assert!(c.suggest(&tx("STARBUCKS", "coffee")).is_none());
        assert!(c.suggest_all(&tx("STARBUCKS", "coffee")).is_empty());
    }

    #[test]
    fn test_feedback_updates_statistics_without_saving() {
        let (_dir, path, c) = setup(0.8, false);
        let before = std::fs::read_to_string(&path).unwrap();
        let s = c.suggest(&tx("STARBUCKS", "")).unwrap();
        c.feedback(&s, true).unwrap();

        let p = c.get_pattern("starbucks").unwrap();
        assert_eq!(p.statistics.accept_count, 1);
        assert_eq!(p.statistics.match_count, 1);
        assert_eq!(p.statistics.accuracy(), 1.0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_feedback_persists_when_learning() {
        let (_dir, path, c) = setup(0.8, true);
        let s = c.suggest(&tx("STARBUCKS", "")).unwrap();
        c.feedback(&s, true).unwrap();
        c.feedback(&s, false).unwrap();

        let reloaded = PatternStore::new().load_file(&path).unwrap();
        let p = reloaded.iter().find(|p| p.id == "starbucks").unwrap();
        assert_eq!(p.statistics.accept_count, 1);
        assert_eq!(p.statistics.reject_count, 1);
        assert_eq!(p.statistics.accuracy(), 0.5);
        // File order survives re-ranking.
        assert_eq!(reloaded[0].id, "starbucks");
    }

    #[test]
    fn test_feedback_save_failure_keeps_memory_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.yaml");
        std::fs::write(&path, PATTERNS).unwrap();
        let c = Categorizer::new(settings_with(Some(path.clone()), 0.8, true)).unwrap();

        // Replace the file with a directory so the write fails.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let s = c.suggest(&tx("STARBUCKS", "")).unwrap();
        assert!(c.feedback(&s, true).is_err());
        assert_eq!(c.get_pattern("starbucks").unwrap().statistics.accept_count, 1);
    }

    #[test]
    fn test_feedback_without_pattern_is_noop() {
        let (_dir, _path, c) = setup(0.8, true);
        let manual = Suggestion::manual(tx("X", "Y"), "Expenses:Misc");
        c.feedback(&manual, true).unwrap();
        assert!(c.patterns().iter().all(|p| p.statistics.match_count == 0));
    }

    #[test]
    fn test_feedback_for_removed_pattern_is_not_found() {
        let (_dir, _path, c) = setup(0.8, false);
        let s = c.suggest(&tx("STARBUCKS", "")).unwrap();
        c.remove_pattern("starbucks").unwrap();
        assert!(matches!(c.feedback(&s, true), Err(QuillError::NotFound(_))));
    }

    #[test]
    fn test_add_and_remove_patterns() {
        let (_dir, _path, c) = setup(0.8, false);
        let uber = Pattern::new("uber", "Uber", "UBER", "Expenses:Transport")
            .unwrap()
            .with_priority(20);
        c.add_pattern(uber.clone()).unwrap();
        assert_eq!(c.pattern_count(), 3);
        assert!(matches!(c.add_pattern(uber), Err(QuillError::DuplicatePattern(_))));
        assert_eq!(
            c.suggest(&tx("UBER *TRIP", "")).unwrap().category,
            "Expenses:Transport"
        );

        c.remove_pattern("uber").unwrap();
        assert!(matches!(c.remove_pattern("uber"), Err(QuillError::NotFound(_))));
        assert_eq!(c.pattern_count(), 2);
    }

    #[test]
    fn test_patterns_is_a_copy() {
        let (_dir, _path, c) = setup(0.8, false);
        let mut copy = c.patterns();
        copy.clear();
        assert_eq!(c.pattern_count(), 2);
    }

    #[test]
    fn test_reload_without_configured_file() {
        let c = Categorizer::new(settings_with(None, 0.8, true)).unwrap();
        assert!(matches!(c.reload_patterns(), Err(QuillError::Other(_))));
    }

    #[test]
    fn test_concurrent_suggest_and_feedback() {
        let (_dir, _path, c) = setup(0.8, false);
        let c = Arc::new(c);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for _ in 0..25 {
                        let s = c.suggest(&tx("STARBUCKS", "coffee")).unwrap();
                        c.feedback(&s, i % 2 == 0).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let stats = c.get_pattern("starbucks").unwrap().statistics;
        assert_eq!(stats.match_count, 100);
        assert_eq!(stats.accept_count + stats.reject_count, 100);
    }
}
