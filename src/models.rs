use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// A quantity of a single commodity, e.g. `-5.00 USD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    pub number: Decimal,
    pub commodity: String,
}

impl Amount {
    pub fn new(number: Decimal, commodity: impl Into<String>) -> Self {
        Self {
            number,
            commodity: commodity.into(),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.commodity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub account: String,
    /// `None` for an auto-balanced leg.
    pub amount: Option<Amount>,
    pub cost: Option<Amount>,
    pub price: Option<Amount>,
    pub metadata: BTreeMap<String, String>,
}

impl Posting {
    pub fn new(account: impl Into<String>, amount: Option<Amount>) -> Self {
        Self {
            account: account.into(),
            amount,
            cost: None,
            price: None,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Cleared,
    Pending,
}

impl Flag {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '*' => Some(Self::Cleared),
            '!' => Some(Self::Pending),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::Cleared => '*',
            Self::Pending => '!',
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A fully parsed transaction. Values handed out by the ledger are never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: String,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub postings: Vec<Posting>,
    pub metadata: BTreeMap<String, String>,
    /// Byte offset of the header line within its source file.
    pub file_position: u64,
    /// 1-based line number of the header line.
    pub line_number: usize,
}

impl Transaction {
    pub fn new(date: NaiveDate, payee: Option<&str>, narration: &str) -> Self {
        Self {
            date,
            flag: Flag::Cleared,
            payee: payee.map(str::to_string),
            narration: narration.to_string(),
            tags: BTreeSet::new(),
            links: BTreeSet::new(),
            postings: Vec::new(),
            metadata: BTreeMap::new(),
            file_position: 0,
            line_number: 0,
        }
    }

    pub fn payee_str(&self) -> &str {
        self.payee.as_deref().unwrap_or("")
    }

    /// Largest absolute posting amount, zero when no posting carries one.
    pub fn largest_magnitude(&self) -> Decimal {
        self.postings
            .iter()
            .filter_map(|p| p.amount.as_ref())
            .map(|a| a.number.abs())
            .max()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Resident index entry for one transaction header. Enough to list and
/// re-locate a transaction without parsing its postings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIndex {
    pub date: NaiveDate,
    /// Payee, or the narration when the header has no payee.
    pub payee: String,
    pub file_path: PathBuf,
    pub file_position: u64,
    pub line_number: usize,
}
