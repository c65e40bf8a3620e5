//! Hit Table Module
//!
//! Parses tabular similarity-search output (BLAST `-outfmt 6` style with the
//! query length appended as the final column) into ordered per-sequence
//! candidate lists.
//!
//! # Hit Table Format (tab-separated, no header)
//! ```text
//! Col   Type    Description
//! 1     string  Sequence id (transcript, CDS or ncRNA candidate)
//! 2     string  Subject accession number
//! ...           Any further search-tool columns (ignored)
//! last  int     Query sequence length
//! ```
//!
//! Rows for one sequence appear in descending score order, so the position of
//! an accession within its sequence's list is its rank.

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::TatatError;

// ============================================================================
// Hit Row
// ============================================================================

/// A single row of the hit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRow {
    /// Query sequence id (column 1).
    pub sequence_id: String,
    /// Subject accession (column 2).
    pub accession: String,
    /// Query length (last column).
    pub length: u64,
}

impl HitRow {
    /// Parses a hit row from a tab-separated line.
    ///
    /// # Errors
    /// Returns `MalformedRecord` if:
    /// - The line has fewer than 3 fields
    /// - The sequence id or accession is empty
    /// - The last field is not a non-negative integer
    pub fn parse_line(line: &str, source: &str, line_no: usize) -> Result<Self, TatatError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(TatatError::malformed(
                source,
                line_no,
                format!("expected at least 3 tab-separated fields, found {}", fields.len()),
            ));
        }

        let sequence_id = fields[0].trim();
        let accession = fields[1].trim();
        if sequence_id.is_empty() || accession.is_empty() {
            return Err(TatatError::malformed(source, line_no, "empty sequence id or accession"));
        }

        let last = fields[fields.len() - 1].trim();
        let length = last.parse().map_err(|_| {
            TatatError::malformed(source, line_no, format!("invalid sequence length '{}'", last))
        })?;

        Ok(Self {
            sequence_id: sequence_id.to_string(),
            accession: accession.to_string(),
            length,
        })
    }
}

// ============================================================================
// Hit Table Reader
// ============================================================================

/// Sequential reader for hit table files. Skips empty lines.
pub struct HitTableReader<R: BufRead> {
    reader: R,
    source: String,
    line_buf: String,
    line_no: usize,
}

impl HitTableReader<BufReader<File>> {
    /// Opens a hit table for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open hit table: {}", path.as_ref().display()))?;
        Ok(Self::new(
            BufReader::with_capacity(1024 * 1024, file),
            path.as_ref().display().to_string(),
        ))
    }
}

impl<R: BufRead> HitTableReader<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            reader,
            source: source.into(),
            line_buf: String::with_capacity(512),
            line_no: 0,
        }
    }

    /// Reads the next hit row.
    ///
    /// # Returns
    /// - `Ok(Some(row))` - Successfully read a row
    /// - `Ok(None)` - End of file reached
    /// - `Err(e)` - I/O or parsing error
    pub fn read_next(&mut self) -> Result<Option<HitRow>> {
        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.line_buf.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            return Ok(Some(HitRow::parse_line(line, &self.source, self.line_no)?));
        }
    }
}

impl<R: BufRead> Iterator for HitTableReader<R> {
    type Item = Result<HitRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

// ============================================================================
// Hit Table
// ============================================================================

/// Candidate accessions and lengths per sequence, in file order.
///
/// Sequence ids keep the position of their first row; candidate lists keep
/// row order; the length of a sequence is taken from its last row.
#[derive(Debug, Clone, Default)]
pub struct HitTable {
    order: Vec<String>,
    candidates: FxHashMap<String, Vec<String>>,
    lengths: FxHashMap<String, u64>,
}

impl HitTable {
    /// Loads a complete hit table from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_rows(HitTableReader::open(path)?)
    }

    /// Builds a table from a row stream, stopping at the first error.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<HitRow>>,
    {
        let mut table = Self::default();
        for row in rows {
            table.push(row?);
        }
        Ok(table)
    }

    /// Appends one row.
    pub fn push(&mut self, row: HitRow) {
        match self.candidates.get_mut(&row.sequence_id) {
            Some(list) => list.push(row.accession),
            None => {
                self.order.push(row.sequence_id.clone());
                self.candidates.insert(row.sequence_id.clone(), vec![row.accession]);
            }
        }
        self.lengths.insert(row.sequence_id, row.length);
    }

    /// Number of distinct sequences.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sequence ids in order of first appearance.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Ordered candidate accessions of one sequence.
    pub fn candidates(&self, id: &str) -> Option<&[String]> {
        self.candidates.get(id).map(Vec::as_slice)
    }

    /// Query length recorded for one sequence.
    pub fn length(&self, id: &str) -> Option<u64> {
        self.lengths.get(id).copied()
    }

    /// `(id, candidates)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.order
            .iter()
            .filter_map(|id| self.candidates.get(id).map(|c| (id.as_str(), c.as_slice())))
    }

    /// `(id, length)` pairs in file order.
    pub fn lengths(&self) -> impl Iterator<Item = (&str, u64)> {
        self.order
            .iter()
            .filter_map(|id| self.lengths.get(id).map(|len| (id.as_str(), *len)))
    }

    /// Keeps only the given sequence ids, preserving order.
    pub fn retain_ids(&mut self, keep: &FxHashSet<String>) {
        self.order.retain(|id| keep.contains(id));
        self.candidates.retain(|id, _| keep.contains(id));
        self.lengths.retain(|id, _| keep.contains(id));
    }

    /// Distinct accessions across all rows, sorted.
    pub fn accessions(&self) -> BTreeSet<String> {
        self.candidates.values().flatten().cloned().collect()
    }
}

// ============================================================================
// Hit Sources
// ============================================================================

/// Anything that can supply a hit table.
pub trait HitSource {
    fn load_hits(&self) -> Result<HitTable>;
}

/// File-backed hit source.
#[derive(Debug, Clone)]
pub struct HitTableFile {
    pub path: PathBuf,
}

impl HitTableFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl HitSource for HitTableFile {
    fn load_hits(&self) -> Result<HitTable> {
        let table = HitTable::load(&self.path)?;
        log::info!("Loaded hits for {} sequences from {}", table.len(), self.path.display());
        Ok(table)
    }
}

impl HitSource for HitTable {
    fn load_hits(&self) -> Result<HitTable> {
        Ok(self.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
