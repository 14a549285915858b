use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::debug;

use crate::error::{QuillError, Result};
use crate::lexer;
use crate::models::TransactionIndex;

/// Positions of every transaction header plus the account and commodity
/// names seen while scanning. Built once per opened ledger.
#[derive(Debug, Clone, Default)]
pub struct Index {
    pub(crate) transactions: Vec<TransactionIndex>,
    pub(crate) accounts: IndexSet<String>,
    pub(crate) commodities: IndexSet<String>,
}

impl Index {
    /// Scan `path` and every file it includes.
    pub fn build(path: &Path) -> Result<Self> {
        let mut indexer = Indexer::default();
        indexer.process_file(path)?;
        debug!(
            "indexed {} transactions across {} file(s)",
            indexer.index.transactions.len(),
            indexer.visited.len()
        );
        Ok(indexer.index)
    }

    pub fn transactions(&self) -> &[TransactionIndex] {
        &self.transactions
    }

    /// Account names in order of first appearance.
    pub fn accounts(&self) -> &IndexSet<String> {
        &self.accounts
    }

    /// Commodity names in order of first appearance.
    pub fn commodities(&self) -> &IndexSet<String> {
        &self.commodities
    }
}

#[derive(Default)]
struct Indexer {
    index: Index,
    visited: HashSet<PathBuf>,
}

impl Indexer {
    fn process_file(&mut self, path: &Path) -> Result<()> {
        let abs = std::fs::canonicalize(path).map_err(|source| QuillError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        if !self.visited.insert(abs.clone()) {
            debug!("skipping already indexed {}", abs.display());
            return Ok(());
        }

        let file = File::open(&abs).map_err(|source| QuillError::Open {
            path: abs.clone(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        // Includes resolve next to the file as named, not its symlink target.
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut buf = Vec::new();
        let mut position: u64 = 0;
        let mut line_number = 0usize;

        loop {
            buf.clear();
            let consumed = reader.read_until(b'\n', &mut buf)?;
            if consumed == 0 {
                break;
            }
            line_number += 1;
            let raw = String::from_utf8_lossy(&buf);
            let line = raw.trim_end_matches(['\n', '\r']);

            if let Some(target) = lexer::include_target(line) {
                let target = Path::new(target);
                let resolved = if target.is_absolute() {
                    target.to_path_buf()
                } else {
                    base_dir.join(target)
                };
                self.process_file(&resolved)?;
            } else {
                if let Some(entry) = lexer::index_entry(line, &abs, position, line_number) {
                    self.index.transactions.push(entry);
                }
                self.record_names(line);
            }

            position += consumed as u64;
        }

        Ok(())
    }

    fn record_names(&mut self, line: &str) {
        let (accounts, commodities) = lexer::extract_accounts_and_commodities(line);
        self.index.accounts.extend(accounts);
        self.index.commodities.extend(commodities);
    }
}
