//! Accession → gene symbol dictionary.
//!
//! Coverage is partial: a search hit whose accession is not in the dictionary
//! is simply unresolvable, which [`AccessionGeneMap::lookup`] reports as
//! `None`.
//!
//! # File Format
//! Headerless, comma-separated, one accession per line:
//! ```text
//! NM_000014.6,A2M
//! XM_011520906.3,LOC105369617
//! ```

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::TatatError;

/// In-memory accession → gene symbol mapping.
#[derive(Debug, Clone, Default)]
pub struct AccessionGeneMap {
    genes: FxHashMap<String, String>,
}

impl AccessionGeneMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gene symbol for an accession, or `None` on a dictionary miss.
    pub fn lookup(&self, accession: &str) -> Option<&str> {
        self.genes.get(accession).map(String::as_str)
    }

    /// Adds or replaces one entry.
    pub fn insert(&mut self, accession: impl Into<String>, gene: impl Into<String>) {
        self.genes.insert(accession.into(), gene.into());
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn contains(&self, accession: &str) -> bool {
        self.genes.contains_key(accession)
    }

    /// Reads a headerless `accession,gene` file.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open accession mapping: {}", path.display()))?;
        Self::from_csv_reader(file, &path.display().to_string())
    }

    /// Parses headerless `accession,gene` rows from any reader.
    ///
    /// Later rows replace earlier rows for the same accession. Extra columns
    /// are ignored; rows with fewer than two fields are malformed.
    pub fn from_csv_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut map = Self::new();
        for (idx, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read {}", source))?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(idx + 1);

            if record.len() == 1 && record[0].trim().is_empty() {
                continue;
            }
            if record.len() < 2 {
                return Err(TatatError::malformed(
                    source,
                    line,
                    "expected 'accession,gene_symbol'",
                )
                .into());
            }

            map.insert(record[0].trim(), record[1].trim());
        }
        Ok(map)
    }

    /// Writes the mapping as a headerless file sorted by accession.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create accession mapping: {}", path.display()))?;
        let mut out = BufWriter::new(file);

        let mut keys: Vec<&String> = self.genes.keys().collect();
        keys.sort();
        for key in keys {
            writeln!(out, "{},{}", key, self.genes[key])?;
        }
        out.flush()?;
        Ok(())
    }

    /// Upper-cases every gene symbol.
    pub fn upper_case_genes(&mut self) {
        for gene in self.genes.values_mut() {
            *gene = gene.to_uppercase();
        }
    }

    /// Drops accessions for which `keep` returns false.
    pub fn retain_accessions<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.genes.retain(|acc, _| keep(acc));
    }
}

impl FromIterator<(String, String)> for AccessionGeneMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            genes: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Dictionary Sources
// ============================================================================

/// Anything that can supply an accession → gene dictionary.
pub trait DictionarySource {
    fn load_dictionary(&self) -> Result<AccessionGeneMap>;
}

/// File-backed dictionary source.
#[derive(Debug, Clone)]
pub struct CsvDictionary {
    pub path: PathBuf,
}

impl CsvDictionary {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl DictionarySource for CsvDictionary {
    fn load_dictionary(&self) -> Result<AccessionGeneMap> {
        let map = AccessionGeneMap::load_csv(&self.path)?;
        log::info!("Accession number count: {}", map.len());
        Ok(map)
    }
}

impl DictionarySource for AccessionGeneMap {
    fn load_dictionary(&self) -> Result<AccessionGeneMap> {
        Ok(self.clone())
    }
}
