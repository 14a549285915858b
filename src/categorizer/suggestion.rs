use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::pattern::Pattern;
use crate::models::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    Pattern,
    Ml,
    History,
    Manual,
}

impl SuggestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Ml => "ml",
            Self::History => "history",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SuggestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lower-ranked category offered alongside the best suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub category: String,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub transaction: Arc<Transaction>,
    pub category: String,
    /// Blended confidence (authored confidence adjusted by feedback history).
    pub confidence: f64,
    /// Snapshot of the originating rule; `None` for non-rule sources.
    pub pattern: Option<Pattern>,
    pub source: SuggestionSource,
    pub reason: String,
    pub alternatives: Vec<Alternative>,
    pub metadata: BTreeMap<String, String>,
    pub created: DateTime<Utc>,
}

impl Suggestion {
    /// A suggestion that did not come from a rule, e.g. a manual pick.
    pub fn manual(transaction: Arc<Transaction>, category: &str) -> Self {
        Self {
            transaction,
            category: category.to_string(),
            confidence: 1.0,
            pattern: None,
            source: SuggestionSource::Manual,
            reason: "Chosen manually".to_string(),
            alternatives: Vec::new(),
            metadata: BTreeMap::new(),
            created: Utc::now(),
        }
    }

    pub fn pattern_id(&self) -> Option<&str> {
        self.pattern.as_ref().map(|p| p.id.as_str())
    }
}
