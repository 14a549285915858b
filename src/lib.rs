//! Lazy ledger loading and rule-based transaction categorization for
//! plain-text double-entry ledgers.
//!
//! [`LedgerFile`] indexes a ledger (following `include` directives) without
//! parsing transaction bodies, then parses individual transactions on
//! demand through a bounded cache. [`Categorizer`] suggests categories for
//! those transactions from a ranked set of regex [`Pattern`]s and learns
//! from accept/reject feedback.

pub mod categorizer;
pub mod error;
pub mod fmt;
pub mod ledger;
pub mod lexer;
pub mod models;
pub mod settings;

pub use categorizer::{Categorizer, Field, Pattern, PatternMatcher, PatternStore, Suggestion};
pub use error::{QuillError, Result};
pub use ledger::LedgerFile;
pub use models::{Amount, Flag, Posting, Transaction, TransactionIndex};
pub use settings::Settings;
