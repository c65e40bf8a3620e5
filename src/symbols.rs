//! Gene symbol classification.
//!
//! Reference databases mark placeholder loci with naming conventions rather
//! than flags: RefSeq uses `LOC<gene id>` for uncharacterised loci and some
//! annotation sources use `CUN…` for low-confidence models. The conventions
//! belong to those databases, so the prefixes are configuration.

use serde::{Deserialize, Serialize};

/// Prefix predicates for provisional and low-confidence gene symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolPolicy {
    /// Prefixes of uncharacterised placeholder loci.
    pub provisional_prefixes: Vec<String>,
    /// Prefixes of low-confidence loci.
    pub low_confidence_prefixes: Vec<String>,
}

impl Default for SymbolPolicy {
    fn default() -> Self {
        Self {
            provisional_prefixes: vec!["LOC".to_string()],
            low_confidence_prefixes: vec!["CUN".to_string()],
        }
    }
}

impl SymbolPolicy {
    pub fn new(provisional: &[&str], low_confidence: &[&str]) -> Self {
        Self {
            provisional_prefixes: provisional.iter().map(|s| s.to_string()).collect(),
            low_confidence_prefixes: low_confidence.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_provisional(&self, gene: &str) -> bool {
        self.provisional_prefixes.iter().any(|p| gene.starts_with(p.as_str()))
    }

    pub fn is_low_confidence(&self, gene: &str) -> bool {
        self.low_confidence_prefixes.iter().any(|p| gene.starts_with(p.as_str()))
    }

    /// Whether a symbol names a real, characterised gene.
    pub fn is_unambiguous(&self, gene: &str) -> bool {
        !self.is_provisional(gene) && !self.is_low_confidence(gene)
    }

    /// Classifies an optional assignment.
    ///
    /// `None` means the sequence was never annotated, which is kept distinct
    /// from `Some(false)` (annotated, but with a placeholder symbol).
    pub fn classify(&self, gene: Option<&str>) -> Option<bool> {
        gene.map(|g| self.is_unambiguous(g))
    }
}
