use colored::Colorize;

use quill::settings::Settings;
use quill::LedgerFile;

use super::{open_ledger, LedgerArg};

pub fn run(ledger: &LedgerArg, settings: &Settings) -> anyhow::Result<()> {
    let ledger = open_ledger(ledger, settings)?;
    println!("{}", format_summary(&ledger));
    Ok(())
}

pub fn format_summary(ledger: &LedgerFile) -> String {
    let mut out = String::new();
    out.push_str(&format!("Ledger:        {}\n", ledger.path().display()));
    out.push_str(&format!("Transactions:  {}\n", ledger.transaction_count()));
    let dates = ledger.entries().iter().map(|e| e.date);
    if let (Some(first), Some(last)) = (dates.clone().min(), dates.max()) {
        out.push_str(&format!("Dates:         {first} .. {last}\n"));
    }

    out.push_str(&format!("\n{} ({})\n", "Accounts".bold(), ledger.accounts().len()));
    for account in ledger.accounts() {
        out.push_str(&format!("  {account}\n"));
    }
    out.push_str(&format!("\n{} ({})\n", "Commodities".bold(), ledger.commodities().len()));
    for commodity in ledger.commodities() {
        out.push_str(&format!("  {commodity}\n"));
    }
    out.trim_end().to_string()
}
