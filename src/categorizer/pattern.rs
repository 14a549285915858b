use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{QuillError, Result};
use crate::models::Transaction;

/// Transaction text a pattern is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Payee,
    Narration,
    /// Payee or narration.
    Any,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payee => "payee",
            Self::Narration => "narration",
            Self::Any => "any",
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "payee" => Ok(Self::Payee),
            "narration" => Ok(Self::Narration),
            "any" => Ok(Self::Any),
            other => Err(format!("invalid field: {other} (must be: payee, narration, or any)")),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usage counters for one pattern. Accuracy is derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternStatistics {
    pub match_count: u32,
    pub accept_count: u32,
    pub reject_count: u32,
    pub last_matched: Option<DateTime<Utc>>,
}

impl PatternStatistics {
    pub fn feedback_count(&self) -> u32 {
        self.accept_count + self.reject_count
    }

    pub fn has_history(&self) -> bool {
        self.feedback_count() > 0
    }

    /// `accept / (accept + reject)`, or 0 with no feedback yet.
    pub fn accuracy(&self) -> f64 {
        let total = self.feedback_count();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.accept_count) / f64::from(total)
    }

    pub fn record(&mut self, accepted: bool) {
        self.match_count += 1;
        if accepted {
            self.accept_count += 1;
        } else {
            self.reject_count += 1;
        }
        self.last_matched = Some(Utc::now());
    }
}

/// A compiled categorization rule.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    pub regex: Regex,
    /// Account suggested when the pattern matches.
    pub category: String,
    pub fields: Vec<Field>,
    /// Higher is tested first.
    pub priority: i32,
    /// Authored confidence in `[0, 1]`.
    pub confidence: f64,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Tags that must all be present on the transaction.
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub statistics: PatternStatistics,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Pattern {
    pub fn new(id: &str, name: &str, source: &str, category: &str) -> Result<Self> {
        let regex = Regex::new(source).map_err(QuillError::from)?;
        let now = Utc::now();
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            regex,
            category: category.to_string(),
            fields: vec![Field::Any],
            priority: 0,
            confidence: 0.7,
            min_amount: None,
            max_amount: None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            statistics: PatternStatistics::default(),
            created: now,
            updated: now,
        })
    }

    /// An empty list means `[Any]`.
    pub fn with_fields(mut self, fields: &[Field]) -> Self {
        self.fields = if fields.is_empty() { vec![Field::Any] } else { fields.to_vec() };
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_amount_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Regex source as authored.
    pub fn source(&self) -> &str {
        self.regex.as_str()
    }

    pub fn has_amount_constraint(&self) -> bool {
        self.min_amount.is_some() || self.max_amount.is_some()
    }

    /// Amount and tag constraints must all hold; field tests are OR-ed.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.has_amount_constraint() && !self.matches_amount(tx) {
            return false;
        }
        if !self.tags.is_empty() && !self.matches_tags(tx) {
            return false;
        }
        self.matches_text(tx)
    }

    fn matches_amount(&self, tx: &Transaction) -> bool {
        let magnitude = tx.largest_magnitude().to_f64().unwrap_or(f64::MAX);
        if self.min_amount.is_some_and(|min| magnitude < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| magnitude > max) {
            return false;
        }
        true
    }

    fn matches_tags(&self, tx: &Transaction) -> bool {
        self.tags.iter().all(|tag| tx.tags.contains(tag))
    }

    fn matches_text(&self, tx: &Transaction) -> bool {
        let payee = tx.payee_str();
        if self.fields.is_empty() || self.fields.contains(&Field::Any) {
            return self.regex.is_match(payee) || self.regex.is_match(&tx.narration);
        }
        self.fields.iter().any(|field| match field {
            Field::Payee => self.regex.is_match(payee),
            Field::Narration => self.regex.is_match(&tx.narration),
            Field::Any => self.regex.is_match(payee) || self.regex.is_match(&tx.narration),
        })
    }
}
