//! Single-line recognizers for the ledger text format.
//!
//! Everything here is a pure function of one line. Block structure (which
//! lines belong to which transaction) is handled by the ledger loader.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use crate::models::{Amount, Flag, Posting, TransactionIndex};

const MAX_COMMODITY_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(\d{4}-\d{2}-\d{2})\s+([*!])\s+(?:"([^"]*?)"\s+)?"([^"]*?)"(.*)$"#)
            .expect("invalid header regex")
    })
}

fn posting_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s+)([A-Z][A-Za-z0-9:_-]*)\s*(.*)$").expect("invalid posting regex")
    })
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(-?\d+(?:\.\d+)?)\s+([A-Z][A-Z0-9._'-]{0,22}[A-Z0-9])")
            .expect("invalid amount regex")
    })
}

fn metadata_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s+)([a-z][a-z0-9_-]*?):\s+(.+)$").expect("invalid metadata regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#([A-Za-z0-9_-]+)").expect("invalid tag regex"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\^([A-Za-z0-9_-]+)").expect("invalid link regex"))
}

fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^include\s+"([^"]+)""#).expect("invalid include regex"))
}

fn account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][A-Za-z0-9]*(?::[A-Z][A-Za-z0-9]*)+)\b").expect("invalid account regex")
    })
}

fn commodity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][A-Z0-9._'-]{0,22}[A-Z0-9])\b").expect("invalid commodity regex")
    })
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[^"]*""#).expect("invalid quoted regex"))
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// A recognized transaction header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: String,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
}

/// A recognized metadata line: `key: value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLine {
    pub indent: usize,
    pub key: String,
    pub value: String,
}

/// A recognized posting line together with its indentation width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingLine {
    pub indent: usize,
    pub posting: Posting,
}

pub fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with(';')
}

pub fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

pub fn parse_header(line: &str) -> Option<Header> {
    let caps = header_re().captures(line)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
    let flag = caps[2].chars().next().and_then(Flag::from_char)?;
    let payee = caps
        .get(3)
        .map(|m| m.as_str())
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let rest = &caps[5];
    Some(Header {
        date,
        flag,
        payee,
        narration: caps[4].to_string(),
        tags: extract_tags(rest),
        links: extract_links(rest),
    })
}

/// Build an index entry for a header line without touching its postings.
pub fn index_entry(line: &str, path: &Path, position: u64, line_number: usize) -> Option<TransactionIndex> {
    let header = parse_header(line)?;
    let payee = header.payee.unwrap_or(header.narration);
    Some(TransactionIndex {
        date: header.date,
        payee,
        file_path: path.to_path_buf(),
        file_position: position,
        line_number,
    })
}

pub fn parse_metadata(line: &str) -> Option<MetadataLine> {
    let caps = metadata_re().captures(line)?;
    Some(MetadataLine {
        indent: caps[1].len(),
        key: caps[2].to_string(),
        value: caps[3].trim().trim_matches('"').to_string(),
    })
}

/// Recognize an indented posting. Amount, cost and price are optional; a
/// trailing `; comment` is ignored.
pub fn parse_posting(line: &str) -> Option<PostingLine> {
    let caps = posting_re().captures(line)?;
    let mut posting = Posting::new(&caps[2], None);

    let rest = caps[3].split(';').next().unwrap_or("").trim();
    if let Some((amount, remaining)) = parse_amount(rest) {
        let mut remaining = remaining.trim_start();

        if let Some(inner) = remaining.strip_prefix('{') {
            if let Some(end) = inner.find('}') {
                posting.cost = parse_amount(inner[..end].trim()).map(|(cost, _)| cost);
                remaining = inner[end + 1..].trim_start();
            }
        }

        if let Some(total) = remaining.strip_prefix("@@") {
            posting.price = parse_amount(total.trim())
                .and_then(|(total, _)| per_unit(&amount, total));
        } else if let Some(unit) = remaining.strip_prefix('@') {
            posting.price = parse_amount(unit.trim()).map(|(price, _)| price);
        }

        posting.amount = Some(amount);
    }

    Some(PostingLine {
        indent: caps[1].len(),
        posting,
    })
}

fn per_unit(units: &Amount, total: Amount) -> Option<Amount> {
    let quantity = units.number.abs();
    let number = total.number.checked_div(quantity)?;
    Some(Amount::new(number, total.commodity))
}

/// Parse `NUMBER COMMODITY` at the start of `s`, returning the amount and
/// whatever text follows it.
pub fn parse_amount(s: &str) -> Option<(Amount, &str)> {
    let caps = amount_re().captures(s)?;
    let number = Decimal::from_str(&caps[1]).ok()?;
    let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    Some((Amount::new(number, &caps[2]), &s[end..]))
}

pub fn extract_tags(s: &str) -> BTreeSet<String> {
    tag_re().captures_iter(s).map(|c| c[1].to_string()).collect()
}

pub fn extract_links(s: &str) -> BTreeSet<String> {
    link_re().captures_iter(s).map(|c| c[1].to_string()).collect()
}

/// Target of an `include "path"` directive, as written.
pub fn include_target(line: &str) -> Option<&str> {
    include_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Account- and commodity-shaped tokens on one line, in order of
/// appearance. Quoted text and comments are not scanned.
pub fn extract_accounts_and_commodities(line: &str) -> (Vec<String>, Vec<String>) {
    if is_blank_or_comment(line) {
        return (Vec::new(), Vec::new());
    }
    let code = line.split(';').next().unwrap_or("");
    let code = quoted_re().replace_all(code, " ");

    let accounts: Vec<String> = account_re()
        .captures_iter(&code)
        .map(|c| c[1].to_string())
        .collect();

    let commodities = commodity_re()
        .captures_iter(&code)
        .map(|c| c[1].to_string())
        .filter(|tok| tok.len() <= MAX_COMMODITY_LEN)
        .filter(|tok| !accounts.iter().any(|acc| acc.contains(tok.as_str())))
        .collect();

    (accounts, commodities)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_header_with_payee_tags_and_links() {
        let h = parse_header(r#"2025-01-01 * "Coffee Shop" "Morning coffee" #food #daily ^receipt-1"#)
            .unwrap();
        assert_eq!(h.date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(h.flag, Flag::Cleared);
        assert_eq!(h.payee.as_deref(), Some("Coffee Shop"));
        assert_eq!(h.narration, "Morning coffee");
        assert!(h.tags.contains("food") && h.tags.contains("daily"));
        assert_eq!(h.links.len(), 1);
        assert!(h.links.contains("receipt-1"));
    }

    #[test]
    fn test_header_narration_only() {
        let h = parse_header(r#"2025-02-03 ! "Pending transfer""#).unwrap();
        assert_eq!(h.flag, Flag::Pending);
        assert_eq!(h.payee, None);
        assert_eq!(h.narration, "Pending transfer");
    }

    #[test]
    fn test_header_rejects_other_directives() {
        assert!(parse_header("2025-01-01 open Assets:Checking USD").is_none());
        assert!(parse_header(r#"  2025-01-01 * "indented""#).is_none());
        assert!(parse_header(r#"2025-13-45 * "bad date""#).is_none());
    }

    #[test]
    fn test_index_entry_falls_back_to_narration() {
        let entry = index_entry(r#"2025-01-05 * "Rent""#, Path::new("main.beancount"), 42, 7).unwrap();
        assert_eq!(entry.payee, "Rent");
        assert_eq!(entry.file_position, 42);
        assert_eq!(entry.line_number, 7);
    }

    #[test]
    fn test_posting_with_amount() {
        let p = parse_posting("  Assets:Checking  -5.00 USD").unwrap();
        assert_eq!(p.indent, 2);
        assert_eq!(p.posting.account, "Assets:Checking");
        let amount = p.posting.amount.unwrap();
        assert_eq!(amount.number, dec("-5.00"));
        assert_eq!(amount.commodity, "USD");
    }

    #[test]
    fn test_posting_without_amount() {
        let p = parse_posting("    Expenses:Food").unwrap();
        assert_eq!(p.posting.account, "Expenses:Food");
        assert!(p.posting.amount.is_none());
    }

    #[test]
    fn test_posting_price_cost_and_comment() {
        let p = parse_posting("  Assets:Broker  10 AAPL {150.00 USD} @ 155.00 USD ; lot").unwrap();
        assert_eq!(p.posting.cost.unwrap().number, dec("150.00"));
        assert_eq!(p.posting.price.unwrap().number, dec("155.00"));

        let p = parse_posting("  Assets:Cash  -20 EUR @@ 22.00 USD").unwrap();
        let price = p.posting.price.unwrap();
        assert_eq!(price.number, dec("1.1"));
        assert_eq!(price.commodity, "USD");
    }

    #[test]
    fn test_posting_requires_indent() {
        assert!(parse_posting("Assets:Checking  -5.00 USD").is_none());
    }

    #[test]
    fn test_metadata_line() {
        let m = parse_metadata(r#"    receipt: "scan-001.pdf""#).unwrap();
        assert_eq!(m.indent, 4);
        assert_eq!(m.key, "receipt");
        assert_eq!(m.value, "scan-001.pdf");
        assert!(parse_metadata("  Assets:Checking  1 USD").is_none());
    }

    #[test]
    fn test_include_target() {
        assert_eq!(include_target(r#"include "2024/q1.beancount""#), Some("2024/q1.beancount"));
        assert_eq!(include_target(r#"; include "x""#), None);
    }

    #[test]
    fn test_accounts_and_commodities() {
        let (accounts, commodities) = extract_accounts_and_commodities("  Assets:Checking  -5.00 USD");
        assert_eq!(accounts, vec!["Assets:Checking"]);
        assert_eq!(commodities, vec!["USD"]);
    }

    #[test]
    fn test_account_segments_are_not_commodities() {
        let (accounts, commodities) =
            extract_accounts_and_commodities("2020-01-01 open Assets:CASH:EU EUR");
        assert_eq!(accounts, vec!["Assets:CASH:EU"]);
        assert_eq!(commodities, vec!["EUR"]);
    }

    #[test]
    fn test_quoted_text_is_not_scanned() {
        let (accounts, commodities) =
            extract_accounts_and_commodities(r#"2025-01-01 * "STARBUCKS #12345" "Morning coffee""#);
        assert!(accounts.is_empty());
        assert!(commodities.is_empty());
    }
}
