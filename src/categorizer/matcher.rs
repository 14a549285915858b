use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use super::pattern::Pattern;
use super::suggestion::{Alternative, Suggestion, SuggestionSource};
use crate::error::{QuillError, Result};
use crate::models::Transaction;

pub const DEFAULT_EARLY_EXIT_THRESHOLD: f64 = 0.95;
pub const DEFAULT_MAX_ALTERNATIVES: usize = 3;

const AUTHORED_WEIGHT: f64 = 0.7;
const HISTORY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherConfig {
    /// A match whose authored confidence reaches this stops the scan.
    /// 1.0 effectively disables early exit.
    pub early_exit_threshold: f64,
    pub max_alternatives: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            early_exit_threshold: DEFAULT_EARLY_EXIT_THRESHOLD,
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
        }
    }
}

/// Authored confidence, blended 70/30 with accuracy once feedback exists.
pub fn blended_confidence(pattern: &Pattern) -> f64 {
    if pattern.statistics.has_history() {
        AUTHORED_WEIGHT * pattern.confidence + HISTORY_WEIGHT * pattern.statistics.accuracy()
    } else {
        pattern.confidence
    }
}

pub fn match_reason(pattern: &Pattern) -> String {
    let mut reason = format!("Matched pattern '{}'", pattern.name);
    let stats = &pattern.statistics;
    if stats.has_history() {
        reason.push_str(&format!(
            " (accuracy: {:.0}% from {} previous matches)",
            stats.accuracy() * 100.0,
            stats.feedback_count()
        ));
    }
    reason
}

fn rank(a: &Pattern, b: &Pattern) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| b.statistics.accuracy().total_cmp(&a.statistics.accuracy()))
}

/// Rule set tested in rank order: priority, then authored confidence, then
/// accuracy, all descending. Ties keep insertion order.
///
/// Patterns are stored in insertion order (the order they are saved in);
/// `ranking` holds indices into that list.
#[derive(Debug, Clone, Default)]
pub struct RankedPatterns {
    patterns: Vec<Pattern>,
    ranking: Vec<usize>,
}

impl RankedPatterns {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        let mut rules = Self {
            patterns,
            ranking: Vec::new(),
        };
        rules.rerank();
        rules
    }

    pub fn push(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
        self.rerank();
    }

    pub fn remove(&mut self, id: &str) -> Option<Pattern> {
        let pos = self.patterns.iter().position(|p| p.id == id)?;
        let removed = self.patterns.remove(pos);
        self.rerank();
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Apply `f` to pattern `id` and restore rank order afterwards.
    pub fn update<F: FnOnce(&mut Pattern)>(&mut self, id: &str, f: F) -> bool {
        match self.patterns.iter_mut().find(|p| p.id == id) {
            Some(pattern) => {
                f(pattern);
                self.rerank();
                true
            }
            None => false,
        }
    }

    pub fn ranked(&self) -> impl Iterator<Item = &Pattern> {
        self.ranking.iter().map(move |&i| &self.patterns[i])
    }

    pub fn as_slice(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn rerank(&mut self) {
        let patterns = &self.patterns;
        let mut ranking: Vec<usize> = (0..patterns.len()).collect();
        ranking.sort_by(|&a, &b| rank(&patterns[a], &patterns[b]));
        self.ranking = ranking;
    }
}

/// Matches transactions against a [`RankedPatterns`] set.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    rules: RankedPatterns,
    config: MatcherConfig,
}

impl PatternMatcher {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self::with_config(patterns, MatcherConfig::default())
    }

    pub fn with_config(patterns: Vec<Pattern>, config: MatcherConfig) -> Self {
        Self {
            rules: RankedPatterns::new(patterns),
            config,
        }
    }

    pub fn config(&self) -> MatcherConfig {
        self.config
    }

    pub fn add(&mut self, pattern: Pattern) {
        self.rules.push(pattern);
    }

    pub fn remove(&mut self, id: &str) -> Option<Pattern> {
        self.rules.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.rules.get(id)
    }

    /// Patterns in insertion order.
    pub fn patterns(&self) -> &[Pattern] {
        self.rules.as_slice()
    }

    pub fn ranked(&self) -> impl Iterator<Item = &Pattern> {
        self.rules.ranked()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Best suggestion for `tx`, with up to `max_alternatives` runners-up.
    ///
    /// Scanning stops at the first match whose authored confidence reaches
    /// the early-exit threshold, or once the alternatives list is full.
    pub fn best_match(&self, tx: &Arc<Transaction>) -> Option<Suggestion> {
        let threshold = self.config.early_exit_threshold;
        let max_alternatives = self.config.max_alternatives;

        let mut best: Option<&Pattern> = None;
        let mut alternatives = Vec::with_capacity(max_alternatives);

        for pattern in self.rules.ranked() {
            if !pattern.matches(tx) {
                continue;
            }
            if best.is_none() {
                best = Some(pattern);
                if pattern.confidence >= threshold || max_alternatives == 0 {
                    break;
                }
                continue;
            }
            alternatives.push(Alternative {
                category: pattern.category.clone(),
                confidence: blended_confidence(pattern),
                reason: match_reason(pattern),
            });
            if pattern.confidence >= threshold || alternatives.len() >= max_alternatives {
                break;
            }
        }

        let mut suggestion = suggest(tx, best?);
        suggestion.alternatives = alternatives;
        Some(suggestion)
    }

    /// Every matching pattern as its own suggestion, highest blended
    /// confidence first. No early exit.
    pub fn match_all(&self, tx: &Arc<Transaction>) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = self
            .rules
            .ranked()
            .filter(|p| p.matches(tx))
            .map(|p| suggest(tx, p))
            .collect();
        suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        suggestions
    }

    /// Record feedback for pattern `id` and re-rank.
    pub fn update_statistics(&mut self, id: &str, accepted: bool) -> Result<()> {
        if self.rules.update(id, |p| p.statistics.record(accepted)) {
            Ok(())
        } else {
            Err(QuillError::NotFound(format!("pattern not found: {id}")))
        }
    }
}

fn suggest(tx: &Arc<Transaction>, pattern: &Pattern) -> Suggestion {
    Suggestion {
        transaction: Arc::clone(tx),
        category: pattern.category.clone(),
        confidence: blended_confidence(pattern),
        pattern: Some(pattern.clone()),
        source: SuggestionSource::Pattern,
        reason: match_reason(pattern),
        alternatives: Vec::new(),
        metadata: BTreeMap::new(),
        created: Utc::now(),
    }
}
