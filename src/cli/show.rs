use std::sync::Arc;

use chrono::NaiveDate;
use comfy_table::{Cell, Table};

use quill::settings::Settings;
use quill::{fmt, Transaction};

use super::{open_ledger, LedgerArg};

pub fn run(
    ledger: &LedgerArg,
    settings: &Settings,
    limit: Option<usize>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let mut ledger = open_ledger(ledger, settings)?;
    let from = from.unwrap_or(NaiveDate::MIN);
    let to = to.unwrap_or(NaiveDate::MAX);

    let ordinals: Vec<usize> = ledger
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| e.date >= from && e.date <= to)
        .map(|(i, _)| i)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    let mut rows = Vec::with_capacity(ordinals.len());
    for i in ordinals {
        rows.push((i + 1, ledger.get_transaction(i)?));
    }
    println!("{}", format_transactions(&rows));
    Ok(())
}

/// First posting amount, which for most entries is the money that moved.
fn display_amount(tx: &Transaction) -> String {
    tx.postings
        .iter()
        .find_map(|p| p.amount.as_ref())
        .map(fmt::amount)
        .unwrap_or_default()
}

pub fn format_transactions(rows: &[(usize, Arc<Transaction>)]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Flag", "Payee", "Narration", "Amount"]);
    for (number, tx) in rows {
        table.add_row(vec![
            Cell::new(number),
            Cell::new(tx.date),
            Cell::new(tx.flag),
            Cell::new(fmt::truncate(tx.payee_str(), 30)),
            Cell::new(fmt::truncate(&tx.narration, 40)),
            Cell::new(display_amount(tx)),
        ]);
    }
    format!("Transactions ({})\n{table}", rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill::{Amount, Posting};
    use rust_decimal::Decimal;

    #[test]
    fn test_format_transactions() {
        let mut tx = Transaction::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), Some("Cafe"), "Latte");
        tx.postings.push(Posting::new("Assets:Checking", Some(Amount::new(Decimal::new(-450, 2), "USD"))));
        tx.postings.push(Posting::new("Expenses:Food", None));

        let out = format_transactions(&[(1, Arc::new(tx))]);
        assert!(out.starts_with("Transactions (1)"));
        assert!(out.contains("2025-01-01"));
        assert!(out.contains("Cafe"));
        assert!(out.contains("-4.50 USD"));
    }
}
