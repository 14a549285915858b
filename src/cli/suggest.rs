use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use quill::settings::Settings;
use quill::{fmt, Suggestion};

use super::{build_categorizer, colored_confidence, open_ledger, LedgerArg};

pub fn run(
    ledger: &LedgerArg,
    settings: &Settings,
    patterns: Option<PathBuf>,
    all: bool,
) -> anyhow::Result<()> {
    let mut ledger = open_ledger(ledger, settings)?;
    let categorizer = build_categorizer(patterns, settings)?;
    if !categorizer.is_enabled() {
        println!("Categorization is disabled in settings.");
        return Ok(());
    }

    let mut rows = Vec::new();
    let mut unmatched = 0;
    for i in 0..ledger.transaction_count() {
        let tx = ledger.get_transaction(i)?;
        let suggestions = if all {
            categorizer.suggest_all(&tx)
        } else {
            categorizer.suggest(&tx).into_iter().collect()
        };
        if suggestions.is_empty() {
            unmatched += 1;
        }
        rows.extend(suggestions.into_iter().map(|s| (i + 1, s)));
    }

    println!("{}", format_suggestions(&rows));
    if unmatched > 0 {
        println!("{}", format!("{unmatched} transaction(s) matched no pattern").yellow());
    }
    Ok(())
}

pub fn format_suggestions(rows: &[(usize, Suggestion)]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Payee", "Category", "Confidence", "Pattern", "Also"]);
    for (number, s) in rows {
        let also = s
            .alternatives
            .iter()
            .map(|a| a.category.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(number),
            Cell::new(s.transaction.date),
            Cell::new(fmt::truncate(s.transaction.payee_str(), 30)),
            Cell::new(&s.category),
            Cell::new(colored_confidence(s.confidence)),
            Cell::new(s.pattern_id().unwrap_or("")),
            Cell::new(also),
        ]);
    }
    format!("Suggestions ({})\n{table}", rows.len())
}
