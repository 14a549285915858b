use std::path::PathBuf;

use anyhow::{anyhow, bail};
use colored::Colorize;

use quill::fmt;
use quill::settings::Settings;

use super::{build_categorizer, open_ledger, LedgerArg};

pub fn run(
    number: usize,
    ledger: &LedgerArg,
    settings: &Settings,
    patterns: Option<PathBuf>,
    accepted: bool,
) -> anyhow::Result<()> {
    let mut ledger = open_ledger(ledger, settings)?;
    let count = ledger.transaction_count();
    if number == 0 || number > count {
        bail!("no transaction #{number}; the ledger has {count}");
    }

    let categorizer = build_categorizer(patterns, settings)?;
    let tx = ledger.get_transaction(number - 1)?;
    let suggestion = categorizer
        .suggest(&tx)
        .ok_or_else(|| anyhow!("no pattern matches transaction #{number}"))?;
    let id = suggestion.pattern_id().unwrap_or_default().to_string();

    categorizer.feedback(&suggestion, accepted)?;

    let stats = categorizer.get_pattern(&id)?.statistics;
    let verdict = if accepted { "Accepted".green() } else { "Rejected".red() };
    println!(
        "{verdict} {} \u{2192} {} (pattern '{id}', accuracy {} over {} review(s))",
        fmt::truncate(tx.payee_str(), 30),
        suggestion.category,
        fmt::percent(stats.accuracy()),
        stats.feedback_count(),
    );

    let learning = categorizer.settings();
    if !learning.categorization.learn_from_edits {
        println!("Learning is off; statistics were not saved.");
    }
    Ok(())
}
