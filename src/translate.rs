//! Coding Sequence Extraction and Translation
//!
//! Cuts a coding region out of its parent transcript, orients it to the
//! coding strand and translates it codon by codon.
//!
//! # Coordinates
//! Feature metadata is 1-based and inclusive; internally spans are 0-based
//! and half-open, so a feature `start=4, end=9` covers `parent[3..9]`.
//!
//! # Translation
//! Codons are consecutive, non-overlapping triplets starting at the first
//! base. A trailing fragment shorter than three bases is looked up as-is and,
//! like any codon with an ambiguous or lowercase base, is not in the table:
//! translation of the whole sequence then fails and no partial protein is
//! produced.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

// ============================================================================
// Strand and Span
// ============================================================================

/// Coding strand relative to the parent sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Parses a `+`/`-` strand symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "+" => Some(Strand::Forward),
            "-" => Some(Strand::Reverse),
            _ => None,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// 0-based, half-open coding span on a parent sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingSpan {
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
}

impl CodingSpan {
    pub fn new(start: usize, end: usize, strand: Strand) -> Self {
        Self { start, end, strand }
    }

    /// Converts 1-based inclusive coordinates. Returns `None` for `start == 0`.
    pub fn from_one_based(start: usize, end: usize, strand: Strand) -> Option<Self> {
        if start == 0 {
            return None;
        }
        Some(Self::new(start - 1, end, strand))
    }

    /// Extracts this span from `parent`, reverse-complemented on the reverse
    /// strand.
    ///
    /// Coordinates past the end of the parent are clamped to its length and
    /// `start >= end` yields an empty sequence.
    ///
    /// Coordinates are byte offsets, so `parent` is expected to be ASCII
    /// nucleotide text. Non-ASCII bytes cut by the span come out as U+FFFD.
    pub fn extract(&self, parent: &str) -> String {
        let bytes = parent.as_bytes();
        let end = self.end.min(bytes.len());
        let start = self.start.min(end);
        let slice = String::from_utf8_lossy(&bytes[start..end]);

        match self.strand {
            Strand::Forward => slice.into_owned(),
            Strand::Reverse => reverse_complement(&slice),
        }
    }
}

/// Reverse complement over A↔T and C↔G. Other symbols are kept as they are.
pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            other => other,
        })
        .collect()
}

// ============================================================================
// Codon Table
// ============================================================================

/// Per-sequence translation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("codon '{codon}' at offset {offset} is not in the genetic code table")]
    UnknownCodon { codon: String, offset: usize },
}

/// Codon → amino acid table.
#[derive(Debug, Clone)]
pub struct CodonTable {
    codons: FxHashMap<String, char>,
}

/// NCBI translation table 1, bases ordered T, C, A, G.
const STANDARD_AMINO_ACIDS: &str =
    "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

static STANDARD: LazyLock<CodonTable> = LazyLock::new(|| {
    const BASES: [char; 4] = ['T', 'C', 'A', 'G'];
    let mut codons = FxHashMap::default();
    let mut amino_acids = STANDARD_AMINO_ACIDS.chars();
    for first in BASES {
        for second in BASES {
            for third in BASES {
                if let Some(aa) = amino_acids.next() {
                    codons.insert([first, second, third].iter().collect::<String>(), aa);
                }
            }
        }
    }
    CodonTable { codons }
});

impl CodonTable {
    /// The standard genetic code, stops as `*`.
    pub fn standard() -> &'static CodonTable {
        &STANDARD
    }

    /// Builds a custom table from `(codon, amino acid)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, char)>,
        S: Into<String>,
    {
        Self {
            codons: pairs.into_iter().map(|(c, aa)| (c.into(), aa)).collect(),
        }
    }

    pub fn get(&self, codon: &str) -> Option<char> {
        self.codons.get(codon).copied()
    }

    pub fn len(&self) -> usize {
        self.codons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codons.is_empty()
    }

    /// Translates a coding sequence in frame 0.
    pub fn translate(&self, cds: &str) -> Result<String, TranslationError> {
        let mut protein = String::with_capacity(cds.len() / 3 + 1);
        for (i, chunk) in cds.as_bytes().chunks(3).enumerate() {
            let codon = String::from_utf8_lossy(chunk);
            match self.get(&codon) {
                Some(aa) => protein.push(aa),
                None => {
                    return Err(TranslationError::UnknownCodon {
                        codon: codon.into_owned(),
                        offset: i * 3,
                    })
                }
            }
        }
        Ok(protein)
    }
}

// ============================================================================
// Translator
// ============================================================================

/// Span extraction plus translation against a fixed table.
#[derive(Debug, Clone, Copy)]
pub struct CodonTranslator<'a> {
    table: &'a CodonTable,
}

impl Default for CodonTranslator<'static> {
    fn default() -> Self {
        Self::new(CodonTable::standard())
    }
}

impl<'a> CodonTranslator<'a> {
    pub fn new(table: &'a CodonTable) -> Self {
        Self { table }
    }

    /// Coding sequence of `span` on `parent`.
    pub fn coding_sequence(&self, parent: &str, span: &CodingSpan) -> String {
        span.extract(parent)
    }

    /// Protein encoded by `span` on `parent`.
    pub fn protein(&self, parent: &str, span: &CodingSpan) -> Result<String, TranslationError> {
        self.table.translate(&span.extract(parent))
    }

    pub fn translate(&self, cds: &str) -> Result<String, TranslationError> {
        self.table.translate(cds)
    }
}

// ============================================================================
// Tests
// ============================================================================
