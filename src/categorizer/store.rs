//! YAML pattern files.
//!
//! ```yaml
//! version: "1"
//! patterns:
//!   - id: starbucks
//!     name: Starbucks
//!     pattern: "STARBUCKS"
//!     category: Expenses:Food:DiningOut
//!     fields: [payee]
//!     priority: 10
//!     confidence: 0.9
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{info, warn};
use regex::Regex;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use super::pattern::{Field, Pattern, PatternStatistics};
use crate::error::{QuillError, Result};

pub const FORMAT_VERSION: &str = "1";
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternFile {
    #[serde(default, deserialize_with = "version_string")]
    pub version: String,
    #[serde(default)]
    pub patterns: Vec<PatternRecord>,
}

/// A pattern as written in the file, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<StatisticsRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// Persisted feedback counters. Accuracy is recomputed on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    #[serde(default)]
    pub match_count: u32,
    #[serde(default)]
    pub accept_count: u32,
    #[serde(default)]
    pub reject_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_matched: Option<DateTime<Utc>>,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

fn version_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match serde_yaml::Value::deserialize(d)? {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("invalid version: {other:?}"))),
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub default_confidence: f64,
    pub default_fields: Vec<Field>,
    /// Fail the whole load on the first invalid pattern instead of skipping it.
    pub strict: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_confidence: DEFAULT_CONFIDENCE,
            default_fields: vec![Field::Any],
            strict: true,
        }
    }
}

/// Loads and saves pattern files.
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    config: StoreConfig,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn lenient() -> Self {
        Self::with_config(StoreConfig {
            strict: false,
            ..StoreConfig::default()
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn load_file(&self, path: &Path) -> Result<Vec<Pattern>> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                QuillError::PatternsFileNotFound(path.to_path_buf())
            } else {
                QuillError::Open {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let patterns = self.load_yaml(&content)?;
        info!("loaded {} pattern(s) from {}", patterns.len(), path.display());
        Ok(patterns)
    }

    pub fn load_yaml(&self, data: &str) -> Result<Vec<Pattern>> {
        let file: PatternFile = serde_yaml::from_str(data)?;
        if !file.version.is_empty() && file.version != FORMAT_VERSION {
            return Err(QuillError::UnsupportedVersion(file.version));
        }

        let mut patterns = Vec::with_capacity(file.patterns.len());
        for (index, record) in file.patterns.into_iter().enumerate() {
            match self.validate(&record) {
                Ok(pattern) => patterns.push(pattern),
                Err(reason) if self.config.strict => {
                    return Err(QuillError::InvalidPattern {
                        index,
                        id: record.id,
                        reason,
                    });
                }
                Err(reason) => {
                    warn!("skipping pattern {index} ({}): {reason}", record.id);
                }
            }
        }
        Ok(patterns)
    }

    /// Validate one record and compile it, applying defaults for omitted
    /// confidence and fields.
    pub fn validate(&self, record: &PatternRecord) -> std::result::Result<Pattern, String> {
        for (value, name) in [
            (&record.id, "id"),
            (&record.name, "name"),
            (&record.pattern, "pattern"),
            (&record.category, "category"),
        ] {
            if value.is_empty() {
                return Err(format!("missing required field: {name}"));
            }
        }

        let regex = Regex::new(&record.pattern).map_err(|e| format!("invalid regex pattern: {e}"))?;

        let fields = if record.fields.is_empty() {
            self.config.default_fields.clone()
        } else {
            record
                .fields
                .iter()
                .map(|f| f.parse::<Field>())
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let confidence = record.confidence.unwrap_or(self.config.default_confidence);
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!("confidence must be between 0 and 1, got: {confidence}"));
        }

        if let (Some(min), Some(max)) = (record.min_amount, record.max_amount) {
            if min > max {
                return Err(format!(
                    "min_amount ({min}) cannot be greater than max_amount ({max})"
                ));
            }
        }

        let statistics = record
            .statistics
            .as_ref()
            .map(|s| PatternStatistics {
                match_count: s.match_count,
                accept_count: s.accept_count,
                reject_count: s.reject_count,
                last_matched: s.last_matched,
            })
            .unwrap_or_default();

        let now = Utc::now();
        Ok(Pattern {
            id: record.id.clone(),
            name: record.name.clone(),
            regex,
            category: record.category.clone(),
            fields,
            priority: record.priority,
            confidence,
            min_amount: record.min_amount,
            max_amount: record.max_amount,
            tags: record.tags.clone(),
            metadata: record.metadata.clone(),
            statistics,
            created: record.created.unwrap_or(now),
            updated: record.updated.unwrap_or(now),
        })
    }

    pub fn to_yaml(&self, patterns: &[Pattern]) -> Result<String> {
        let file = PatternFile {
            version: FORMAT_VERSION.to_string(),
            patterns: patterns.iter().map(to_record).collect(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    pub fn save_file(&self, path: &Path, patterns: &[Pattern]) -> Result<()> {
        let yaml = self.to_yaml(patterns)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, yaml)?;
        info!("saved {} pattern(s) to {}", patterns.len(), path.display());
        Ok(())
    }
}

fn to_record(pattern: &Pattern) -> PatternRecord {
    let stats = &pattern.statistics;
    let statistics = (stats.match_count > 0 || stats.has_history()).then(|| StatisticsRecord {
        match_count: stats.match_count,
        accept_count: stats.accept_count,
        reject_count: stats.reject_count,
        last_matched: stats.last_matched,
    });
    PatternRecord {
        id: pattern.id.clone(),
        name: pattern.name.clone(),
        pattern: pattern.source().to_string(),
        category: pattern.category.clone(),
        fields: pattern.fields.iter().map(|f| f.as_str().to_string()).collect(),
        priority: pattern.priority,
        confidence: Some(pattern.confidence),
        min_amount: pattern.min_amount,
        max_amount: pattern.max_amount,
        tags: pattern.tags.clone(),
        metadata: pattern.metadata.clone(),
        statistics,
        created: Some(pattern.created),
        updated: Some(pattern.updated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_PATTERNS: &str = r#"
version: "1"
patterns:
  - id: first
    name: First
    pattern: "FIRST"
    category: Expenses:First
  - id: broken
    name: Broken
    pattern: "BROKEN"
    category: Expenses:Broken
    min_amount: 500
    max_amount: 100
  - id: third
    name: Third
    pattern: "THIRD"
    category: Expenses:Third
"#;

    #[test]
    fn test_defaults_applied() {
        let yaml = "patterns:\n  - id: a\n    name: A\n    pattern: \"A\"\n    category: Expenses:A\n";
        let patterns = PatternStore::new().load_yaml(yaml).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].confidence, DEFAULT_CONFIDENCE);
        assert_eq!(patterns[0].fields, vec![Field::Any]);
        assert_eq!(patterns[0].priority, 0);
    }

    #[test]
    fn test_explicit_zero_confidence_is_kept() {
        let yaml = "patterns:\n  - id: a\n    name: A\n    pattern: \"A\"\n    category: X\n    confidence: 0\n";
        let patterns = PatternStore::new().load_yaml(yaml).unwrap();
        assert_eq!(patterns[0].confidence, 0.0);
    }

    #[test]
    fn test_strict_mode_fails_whole_load() {
        let err = PatternStore::new().load_yaml(THREE_PATTERNS).unwrap_err();
        match err {
            QuillError::InvalidPattern { index, id, .. } => {
                assert_eq!(index, 1);
                assert_eq!(id, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lenient_mode_skips_invalid() {
        let patterns = PatternStore::lenient().load_yaml(THREE_PATTERNS).unwrap();
        let ids: Vec<_> = patterns.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["first", "third"]);
    }

    #[test]
    fn test_validation_errors() {
        let store = PatternStore::new();
        let base = PatternRecord {
            id: "x".into(),
            name: "X".into(),
            pattern: "X".into(),
            category: "Expenses:X".into(),
            ..PatternRecord::default()
        };
        assert!(store.validate(&base).is_ok());

        let missing = PatternRecord { category: String::new(), ..base.clone() };
        assert_eq!(store.validate(&missing).unwrap_err(), "missing required field: category");

        let bad_field = PatternRecord { fields: vec!["memo".into()], ..base.clone() };
        assert!(store.validate(&bad_field).unwrap_err().contains("invalid field"));

        let bad_conf = PatternRecord { confidence: Some(1.5), ..base.clone() };
        assert!(store.validate(&bad_conf).unwrap_err().contains("confidence"));

        let bad_regex = PatternRecord { pattern: "(".into(), ..base };
        assert!(store.validate(&bad_regex).unwrap_err().contains("invalid regex"));
    }

    #[test]
    fn test_unsupported_version() {
        let err = PatternStore::new().load_yaml("version: \"2\"\npatterns: []\n").unwrap_err();
        assert!(matches!(err, QuillError::UnsupportedVersion(v) if v == "2"));
        assert!(PatternStore::new().load_yaml("version: 1\npatterns: []\n").is_ok());
    }

    #[test]
    fn test_missing_file_is_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PatternStore::new().load_file(&dir.path().join("none.yaml")).unwrap_err();
        assert!(matches!(err, QuillError::PatternsFileNotFound(_)));
    }

    #[test]
    fn test_save_then_load_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("patterns.yaml");

        let mut original = Pattern::new("fuel", "Fuel", r"(?i)shell|chevron", "Expenses:Auto:Fuel")
            .unwrap()
            .with_fields(&[Field::Payee, Field::Narration])
            .with_priority(7)
            .with_confidence(0.85)
            .with_amount_range(Some(10.0), Some(150.5))
            .with_tags(&["car"]);
        original.metadata.insert("owner".into(), "ops".into());
        original.statistics.record(true);
        original.statistics.record(false);

        let store = PatternStore::new();
        store.save_file(&path, &[original.clone()]).unwrap();
        let loaded = store.load_file(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        let p = &loaded[0];

        assert_eq!(p.id, original.id);
        assert_eq!(p.name, original.name);
        assert_eq!(p.source(), original.source());
        assert_eq!(p.category, original.category);
        assert_eq!(p.fields, original.fields);
        assert_eq!(p.priority, 7);
        assert_eq!(p.confidence, 0.85);
        assert_eq!(p.min_amount, Some(10.0));
        assert_eq!(p.max_amount, Some(150.5));
        assert_eq!(p.tags, original.tags);
        assert_eq!(p.metadata, original.metadata);
        assert_eq!(p.statistics, original.statistics);
        assert_eq!(p.created, original.created);
    }

    #[test]
    fn test_empty_fields_round_trip_as_any() {
        let store = PatternStore::new();
        let pattern = Pattern::new("tea", "Tea", "(?i)tea", "Expenses:Tea")
            .unwrap()
            .with_fields(&[]);
        let yaml = store.to_yaml(&[pattern.clone()]).unwrap();
        assert!(yaml.contains("fields:"));
        let loaded = store.load_yaml(&yaml).unwrap();
        assert_eq!(loaded[0].fields, pattern.fields);
    }
}
