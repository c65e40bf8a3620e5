//! Run configuration.
//!
//! Everything the pipeline needs is passed in explicitly through these
//! structs; nothing is read from the environment. Each struct has a usable
//! `Default`, and all of them can be loaded from JSON with missing fields
//! falling back to those defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::symbols::SymbolPolicy;

/// Column names of the metadata sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationColumns {
    /// Primary key column holding the sequence id.
    pub key: String,
    pub accession: String,
    pub gene: String,
    pub unambiguous: String,
    pub core: String,
}

impl AnnotationColumns {
    /// CDS metadata file layout.
    pub fn cds() -> Self {
        Self {
            key: "cds_id".to_string(),
            accession: "accession_number".to_string(),
            gene: "gene".to_string(),
            unambiguous: "unambiguous_gene".to_string(),
            core: "core_cds".to_string(),
        }
    }

    /// ncRNA table layout.
    pub fn ncrna() -> Self {
        Self {
            key: "uid".to_string(),
            accession: "accession_number".to_string(),
            gene: "gene_symbol".to_string(),
            unambiguous: "unambiguous_gene".to_string(),
            core: "core_ncrna".to_string(),
        }
    }

    /// Annotation columns in output order (key excluded).
    pub fn fields(&self) -> [&str; 4] {
        [
            self.accession.as_str(),
            self.gene.as_str(),
            self.unambiguous.as_str(),
            self.core.as_str(),
        ]
    }
}

impl Default for AnnotationColumns {
    fn default() -> Self {
        Self::cds()
    }
}

/// Settings for one gene-assignment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub symbols: SymbolPolicy,
    pub columns: AnnotationColumns,
}

impl AnnotationConfig {
    /// Loads a config whose missing column names fall back to the CDS layout.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_columns(path, AnnotationColumns::default())
    }

    /// Loads a config on top of `columns`: only the column names present in
    /// the file replace the preset.
    pub fn load_with_columns<P: AsRef<Path>>(path: P, columns: AnnotationColumns) -> Result<Self> {
        let path = path.as_ref();
        let base = Self {
            columns,
            ..Default::default()
        };
        let mut merged = serde_json::to_value(&base)
            .with_context(|| format!("Failed to serialize base config for {}", path.display()))?;
        overlay(&mut merged, load_json(path)?);
        serde_json::from_value(merged)
            .with_context(|| format!("Invalid config in {}", path.display()))
    }
}

/// Recursively replaces the fields of `base` with those set in `patch`.
fn overlay(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Row filters for CDS/protein extraction.
///
/// Each map is `column → required value`; a row passes when every listed
/// column equals its value exactly. A missing `cds_metadata` section means
/// every CDS passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionFilters {
    pub transcriptome_metadata: BTreeMap<String, String>,
    pub cds_metadata: Option<BTreeMap<String, String>>,
}

impl ExtractionFilters {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_json(path.as_ref())
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open config: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid JSON in {}", path.display()))
}
