use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Pattern with ID '{0}' already exists")]
    DuplicatePattern(String),

    #[error("Patterns file not found: {}", .0.display())]
    PatternsFileNotFound(PathBuf),

    #[error("Error in pattern {index} ({id}): {reason}")]
    InvalidPattern {
        index: usize,
        id: String,
        reason: String,
    },

    #[error("Unsupported patterns file version: {0} (expected: 1)")]
    UnsupportedVersion(String),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, QuillError>;
