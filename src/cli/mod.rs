pub mod feedback;
pub mod index;
pub mod patterns;
pub mod show;
pub mod suggest;

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use colored::{ColoredString, Colorize};

use quill::settings::{default_patterns_path, Settings};
use quill::{Categorizer, LedgerFile};

#[derive(Parser)]
#[command(name = "quill", version, about = "Index plain-text ledgers and suggest categories for their transactions.")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to find the ledger; falls back to `files.default_ledger`.
#[derive(Args)]
pub struct LedgerArg {
    /// Path to the ledger file
    #[arg(short, long)]
    pub ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a ledger and print what it contains.
    Index {
        #[command(flatten)]
        ledger: LedgerArg,
    },
    /// Print transactions from a ledger.
    Show {
        #[command(flatten)]
        ledger: LedgerArg,
        /// Maximum number of transactions to print
        #[arg(long)]
        limit: Option<usize>,
        /// Earliest date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Suggest a category for every transaction in a ledger.
    Suggest {
        #[command(flatten)]
        ledger: LedgerArg,
        /// Pattern file to use instead of the configured one
        #[arg(long)]
        patterns: Option<PathBuf>,
        /// Show every matching pattern, not only the best
        #[arg(long)]
        all: bool,
    },
    /// Inspect pattern files.
    Patterns {
        #[command(subcommand)]
        command: PatternsCommands,
    },
    /// Accept or reject the best suggestion for one transaction.
    Feedback {
        /// Transaction number, as printed by `show`
        number: usize,
        #[command(flatten)]
        ledger: LedgerArg,
        /// Pattern file to use instead of the configured one
        #[arg(long)]
        patterns: Option<PathBuf>,
        /// The suggestion was right
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        accept: bool,
        /// The suggestion was wrong
        #[arg(long)]
        reject: bool,
    },
}

#[derive(Subcommand)]
pub enum PatternsCommands {
    /// Validate a pattern file.
    Check {
        /// Path to the pattern file
        file: PathBuf,
        /// Skip invalid patterns instead of failing
        #[arg(long)]
        lenient: bool,
    },
    /// List patterns with their feedback statistics.
    List {
        /// Pattern file to use instead of the configured one
        #[arg(long)]
        patterns: Option<PathBuf>,
    },
}

pub(crate) fn resolve_ledger(arg: &LedgerArg, settings: &Settings) -> anyhow::Result<PathBuf> {
    match arg.ledger.as_ref().or(settings.files.default_ledger.as_ref()) {
        Some(path) => Ok(path.clone()),
        None => bail!("no ledger given; pass --ledger or set files.default_ledger in settings"),
    }
}

pub(crate) fn open_ledger(arg: &LedgerArg, settings: &Settings) -> anyhow::Result<LedgerFile> {
    let path = resolve_ledger(arg, settings)?;
    LedgerFile::open(&path).with_context(|| format!("failed to open ledger {}", path.display()))
}

/// The pattern file in effect: the override, the configured file, or the
/// default location under the config directory.
pub(crate) fn patterns_path(patterns: Option<PathBuf>, settings: &Settings) -> PathBuf {
    patterns
        .or_else(|| settings.files.patterns_file.clone())
        .unwrap_or_else(default_patterns_path)
}

pub(crate) fn build_categorizer(patterns: Option<PathBuf>, settings: &Settings) -> anyhow::Result<Categorizer> {
    let mut settings = settings.clone();
    settings.files.patterns_file = Some(patterns_path(patterns, &settings));
    Categorizer::new(settings).context("failed to load patterns")
}

pub(crate) fn colored_confidence(confidence: f64) -> ColoredString {
    let text = quill::fmt::percent(confidence);
    if confidence >= 0.9 {
        text.green()
    } else if confidence >= 0.7 {
        text.yellow()
    } else {
        text.red()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ledger_prefers_argument() {
        let mut settings = Settings::default();
        settings.files.default_ledger = Some(PathBuf::from("/ledgers/default.beancount"));

        let arg = LedgerArg { ledger: Some(PathBuf::from("/tmp/x.beancount")) };
        assert_eq!(resolve_ledger(&arg, &settings).unwrap(), PathBuf::from("/tmp/x.beancount"));

        let arg = LedgerArg { ledger: None };
        assert_eq!(
            resolve_ledger(&arg, &settings).unwrap(),
            PathBuf::from("/ledgers/default.beancount")
        );

        assert!(resolve_ledger(&arg, &Settings::default()).is_err());
    }

    #[test]
    fn test_patterns_path_precedence() {
        let mut settings = Settings::default();
        assert_eq!(patterns_path(None, &settings), default_patterns_path());
        settings.files.patterns_file = Some(PathBuf::from("/cfg/p.yaml"));
        assert_eq!(patterns_path(None, &settings), PathBuf::from("/cfg/p.yaml"));
        assert_eq!(
            patterns_path(Some(PathBuf::from("/o.yaml")), &settings),
            PathBuf::from("/o.yaml")
        );
    }

    #[test]
    fn test_cli_parses_feedback() {
        let cli = Cli::try_parse_from(["quill", "feedback", "2", "--reject", "-l", "x.beancount"]).unwrap();
        match cli.command {
            Commands::Feedback { number, accept, reject, ledger, .. } => {
                assert_eq!(number, 2);
                assert!(!accept && reject);
                assert_eq!(ledger.ledger, Some(PathBuf::from("x.beancount")));
            }
            _ => panic!("expected feedback"),
        }
        assert!(Cli::try_parse_from(["quill", "feedback", "2"]).is_err());
        assert!(Cli::try_parse_from(["quill", "feedback", "2", "--accept", "--reject"]).is_err());
    }
}
