use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use comfy_table::{Cell, Table};

use quill::settings::Settings;
use quill::{fmt, Pattern, PatternStore};

use super::{colored_confidence, patterns_path};

pub fn check(file: &Path, lenient: bool) -> anyhow::Result<()> {
    let store = if lenient { PatternStore::lenient() } else { PatternStore::new() };
    let patterns = store
        .load_file(file)
        .with_context(|| format!("{} is not a valid pattern file", file.display()))?;
    println!(
        "{} {} pattern(s) in {}",
        "OK".green().bold(),
        patterns.len(),
        file.display()
    );
    Ok(())
}

pub fn list(patterns: Option<PathBuf>, settings: &Settings) -> anyhow::Result<()> {
    let path = patterns_path(patterns, settings);
    let patterns = PatternStore::new()
        .load_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    println!("{}", format_patterns(&patterns));
    Ok(())
}

pub fn format_patterns(patterns: &[Pattern]) -> String {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Pattern", "Category", "Fields", "Priority", "Confidence", "Matches", "Accuracy",
    ]);
    for p in patterns {
        let fields = p.fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(",");
        let accuracy = if p.statistics.has_history() {
            fmt::percent(p.statistics.accuracy())
        } else {
            "-".to_string()
        };
        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(fmt::truncate(p.source(), 30)),
            Cell::new(&p.category),
            Cell::new(fields),
            Cell::new(p.priority),
            Cell::new(colored_confidence(p.confidence)),
            Cell::new(p.statistics.match_count),
            Cell::new(accuracy),
        ]);
    }
    format!("Patterns ({})\n{table}", patterns.len())
}
