//! Lazily loaded ledger files.
//!
//! Opening a ledger scans it once to build an [`Index`]; individual
//! transactions are parsed on demand by seeking to their recorded offset.

pub mod cache;
pub mod index;

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::IndexSet;
use log::debug;

use crate::error::{QuillError, Result};
use crate::lexer;
use crate::models::{Transaction, TransactionIndex};

pub use cache::{TransactionCache, DEFAULT_CAPACITY};
pub use index::Index;

/// An opened ledger. Lookups mutate the cache, so `get_transaction` needs
/// `&mut self`; share across threads behind a `Mutex` if needed.
#[derive(Debug)]
pub struct LedgerFile {
    path: PathBuf,
    index: Index,
    cache: TransactionCache,
}

impl LedgerFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    pub fn open_with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let index = Index::build(&path)?;
        Ok(Self {
            path,
            index,
            cache: TransactionCache::new(capacity),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn transaction_count(&self) -> usize {
        self.index.transactions.len()
    }

    pub fn entries(&self) -> &[TransactionIndex] {
        self.index.transactions()
    }

    pub fn entry(&self, ordinal: usize) -> Option<&TransactionIndex> {
        self.index.transactions.get(ordinal)
    }

    pub fn accounts(&self) -> &IndexSet<String> {
        self.index.accounts()
    }

    pub fn commodities(&self) -> &IndexSet<String> {
        self.index.commodities()
    }

    pub fn cache(&self) -> &TransactionCache {
        &self.cache
    }

    /// Fetch transaction `ordinal` (0-based, file scan order), parsing it from
    /// disk on a cache miss.
    pub fn get_transaction(&mut self, ordinal: usize) -> Result<Arc<Transaction>> {
        let entry = self
            .index
            .transactions
            .get(ordinal)
            .ok_or_else(|| QuillError::NotFound(format!("transaction index out of range: {ordinal}")))?;

        if let Some(tx) = self.cache.get(ordinal) {
            return Ok(tx);
        }

        debug!("cache miss for transaction {ordinal}, reparsing {}:{}", entry.file_path.display(), entry.line_number);
        let tx = Arc::new(parse_transaction_at(
            &entry.file_path,
            entry.file_position,
            entry.line_number,
        )?);
        if let Some(evicted) = self.cache.insert(ordinal, Arc::clone(&tx)) {
            debug!("evicted transaction {evicted} from cache");
        }
        Ok(tx)
    }

    /// Every transaction dated within `start..=end`, in file order.
    pub fn transactions_in_range(&mut self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Arc<Transaction>>> {
        let ordinals: Vec<usize> = self
            .index
            .transactions
            .iter()
            .enumerate()
            .filter(|(_, e)| e.date >= start && e.date <= end)
            .map(|(i, _)| i)
            .collect();
        ordinals.into_iter().map(|i| self.get_transaction(i)).collect()
    }
}

/// Open `path`, seek to `position` and parse the transaction starting there.
/// The handle is dropped before returning.
pub fn parse_transaction_at(path: &Path, position: u64, line_number: usize) -> Result<Transaction> {
    let mut file = File::open(path).map_err(|source| QuillError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    file.seek(SeekFrom::Start(position))?;
    let mut tx = parse_transaction(BufReader::new(file), path, line_number)?;
    tx.file_position = position;
    Ok(tx)
}

/// Parse one transaction block from `reader`, whose first line must be the
/// header. Unrecognized indented lines are skipped.
pub fn parse_transaction<R: BufRead>(mut reader: R, path: &Path, start_line: usize) -> Result<Transaction> {
    let mut buf = Vec::new();

    let header_line = match next_line(&mut reader, &mut buf)? {
        Some(line) => line,
        None => {
            return Err(QuillError::Parse {
                path: path.to_path_buf(),
                line: start_line,
                message: "unexpected end of file".into(),
            })
        }
    };
    let header = lexer::parse_header(&header_line).ok_or_else(|| QuillError::Parse {
        path: path.to_path_buf(),
        line: start_line,
        message: format!("invalid transaction header: {header_line}"),
    })?;

    let mut tx = Transaction {
        date: header.date,
        flag: header.flag,
        payee: header.payee,
        narration: header.narration,
        tags: header.tags,
        links: header.links,
        postings: Vec::new(),
        metadata: Default::default(),
        file_position: 0,
        line_number: start_line,
    };

    // Indentation of the most recent posting; deeper metadata belongs to it.
    let mut posting_indent: Option<usize> = None;

    while let Some(line) = next_line(&mut reader, &mut buf)? {
        let line = line.as_str();
        if lexer::is_blank_or_comment(line) {
            continue;
        }
        if !lexer::is_indented(line) {
            break;
        }

        if let Some(meta) = lexer::parse_metadata(line) {
            match (posting_indent, tx.postings.last_mut()) {
                (Some(indent), Some(posting)) if meta.indent > indent => {
                    posting.metadata.insert(meta.key, meta.value);
                }
                _ => {
                    tx.metadata.insert(meta.key, meta.value);
                }
            }
            continue;
        }

        if let Some(parsed) = lexer::parse_posting(line) {
            posting_indent = Some(parsed.indent);
            tx.postings.push(parsed.posting);
        }
    }

    Ok(tx)
}

/// Next line without its terminator. Invalid UTF-8 is replaced rather than
/// rejected, matching what the indexer saw.
fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}
