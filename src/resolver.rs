//! Best-Hit Gene Resolver
//!
//! Assigns each searched sequence one accession and gene symbol from its
//! ordered candidate hits.
//!
//! # Resolution Rules
//! Candidates are scanned in search-tool order (best score first):
//! 1. Accessions missing from the dictionary are skipped
//! 2. The first resolvable accession is remembered as the fallback
//! 3. The first resolvable accession whose symbol is not provisional wins
//!    immediately (a low-confidence symbol still wins here)
//! 4. Without such a hit the fallback is used
//! 5. A sequence with no resolvable accession gets no assignment

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::dictionary::AccessionGeneMap;
use crate::hits::HitTable;
use crate::symbols::SymbolPolicy;

// ============================================================================
// Data Structures
// ============================================================================

/// Gene assignment of one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Accession the gene symbol was taken from.
    pub accession: String,
    /// Resolved gene symbol.
    pub gene_symbol: String,
    /// Symbol is neither provisional nor low-confidence.
    pub unambiguous: bool,
}

/// Aggregate counters from one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub sequences: usize,
    pub assigned: usize,
    pub unassigned: usize,
    /// Candidates skipped because their accession was not in the dictionary.
    pub lookup_misses: usize,
}

/// Assignments keyed by sequence id, in hit-table order.
#[derive(Debug, Clone, Default)]
pub struct Assignments {
    order: Vec<String>,
    by_id: FxHashMap<String, Assignment>,
    pub stats: ResolutionStats,
}

impl Assignments {
    pub fn get(&self, id: &str) -> Option<&Assignment> {
        self.by_id.get(id)
    }

    pub fn gene(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(|a| a.gene_symbol.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(id, assignment)` pairs in hit-table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Assignment)> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|a| (id.as_str(), a)))
    }

    /// Distinct gene symbols with at least one assignment.
    pub fn genes(&self) -> BTreeSet<&str> {
        self.by_id.values().map(|a| a.gene_symbol.as_str()).collect()
    }

    fn insert(&mut self, id: &str, assignment: Assignment) {
        if self.by_id.insert(id.to_string(), assignment).is_none() {
            self.order.push(id.to_string());
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves candidate hits against a dictionary under a symbol policy.
pub struct BestHitResolver<'a> {
    dictionary: &'a AccessionGeneMap,
    policy: &'a SymbolPolicy,
}

impl<'a> BestHitResolver<'a> {
    pub fn new(dictionary: &'a AccessionGeneMap, policy: &'a SymbolPolicy) -> Self {
        Self { dictionary, policy }
    }

    /// Resolves one ordered candidate list.
    pub fn resolve<S: AsRef<str>>(&self, candidates: &[S]) -> Option<Assignment> {
        self.scan(candidates, &mut 0)
    }

    fn scan<S: AsRef<str>>(&self, candidates: &[S], misses: &mut usize) -> Option<Assignment> {
        let mut first_hit: Option<(&str, &str)> = None;

        for candidate in candidates {
            let accession = candidate.as_ref();
            let Some(gene) = self.dictionary.lookup(accession) else {
                *misses += 1;
                continue;
            };

            if first_hit.is_none() {
                first_hit = Some((accession, gene));
            }

            if !self.policy.is_provisional(gene) {
                return Some(self.assignment(accession, gene));
            }
        }

        first_hit.map(|(accession, gene)| self.assignment(accession, gene))
    }

    fn assignment(&self, accession: &str, gene: &str) -> Assignment {
        Assignment {
            accession: accession.to_string(),
            gene_symbol: gene.to_string(),
            unambiguous: self.policy.is_unambiguous(gene),
        }
    }

    /// Resolves every sequence of a hit table.
    pub fn resolve_all(&self, hits: &HitTable) -> Assignments {
        let mut assignments = Assignments::default();
        let mut stats = ResolutionStats::default();

        for (id, candidates) in hits.iter() {
            stats.sequences += 1;
            match self.scan(candidates, &mut stats.lookup_misses) {
                Some(assignment) => {
                    stats.assigned += 1;
                    assignments.insert(id, assignment);
                }
                None => stats.unassigned += 1,
            }
        }

        log::info!(
            "Resolved genes for {}/{} sequences ({} dictionary misses)",
            stats.assigned,
            stats.sequences,
            stats.lookup_misses
        );
        assignments.stats = stats;
        assignments
    }
}

// ============================================================================
// Tests
// ============================================================================
