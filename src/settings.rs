use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QuillError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub files: FileSettings,
    #[serde(default)]
    pub categorization: CategorizationSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub default_ledger: Option<PathBuf>,
    #[serde(default)]
    pub patterns_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub auto_categorize: bool,
    /// Feeds the matcher's early-exit threshold.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_true")]
    pub learn_from_edits: bool,
}

fn default_true() -> bool {
    true
}

fn default_confidence_threshold() -> f64 {
    0.8
}

impl Default for CategorizationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_categorize: false,
            confidence_threshold: default_confidence_threshold(),
            learn_from_edits: true,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let threshold = self.categorization.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(QuillError::Settings(format!(
                "confidence threshold must be between 0 and 1, got {threshold}"
            )));
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("quill")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Default location for the pattern file when settings name none.
pub fn default_patterns_path() -> PathBuf {
    config_dir().join("patterns.yaml")
}

/// Load settings from `path`; a missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    let settings: Settings =
        serde_json::from_str(&content).map_err(|e| QuillError::Settings(e.to_string()))?;
    settings.validate()?;
    Ok(settings)
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path())
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    settings.validate()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| QuillError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn shellexpand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}
