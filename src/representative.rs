//! Core (representative) sequence selection.
//!
//! Each gene keeps the longest sequence assigned to it. Sequences are visited
//! in source-file order and a gene's representative is only replaced by a
//! strictly longer sequence, so equal-length ties go to the sequence seen
//! first.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

use crate::resolver::Assignments;

/// Gene symbol → representative sequence id, ordered by gene symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepresentativeSet {
    by_gene: BTreeMap<String, String>,
}

impl RepresentativeSet {
    pub fn get(&self, gene: &str) -> Option<&str> {
        self.by_gene.get(gene).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_gene.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_gene.is_empty()
    }

    /// `(gene, id)` pairs sorted by gene symbol.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_gene.iter().map(|(g, id)| (g.as_str(), id.as_str()))
    }

    /// Set of representative ids, for flagging core sequences.
    pub fn core_ids(&self) -> FxHashSet<&str> {
        self.by_gene.values().map(String::as_str).collect()
    }
}

#[derive(Debug, Default)]
struct RunningBest<'a> {
    id: &'a str,
    length: u64,
}

/// Picks the longest assigned sequence per gene.
///
/// # Arguments
/// * `lengths` - `(id, length)` pairs in source-file order
/// * `assignments` - Gene assignments; ids without one are ignored
///
/// # Returns
/// One representative per gene that has an assigned sequence of non-zero
/// length.
pub fn select_representatives<'a, I>(lengths: I, assignments: &Assignments) -> RepresentativeSet
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut best: FxHashMap<&str, RunningBest<'a>> = assignments
        .genes()
        .into_iter()
        .map(|gene| (gene, RunningBest::default()))
        .collect();

    for (id, length) in lengths {
        let Some(gene) = assignments.gene(id) else {
            continue;
        };
        if let Some(current) = best.get_mut(gene) {
            if length > current.length {
                current.id = id;
                current.length = length;
            }
        }
    }

    let by_gene: BTreeMap<String, String> = best
        .into_iter()
        .filter(|(_, b)| !b.id.is_empty())
        .map(|(gene, b)| (gene.to_string(), b.id.to_string()))
        .collect();

    log::info!("Core sequence count: {}", by_gene.len());
    RepresentativeSet { by_gene }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::AccessionGeneMap;
    use crate::hits::{HitRow, HitTable};
    use crate::resolver::BestHitResolver;
    use crate::symbols::SymbolPolicy;

    fn setup(rows: &[(&str, &str, u64)], dict: &[(&str, &str)]) -> (HitTable, Assignments) {
        let mut hits = HitTable::default();
        for (id, acc, len) in rows {
            hits.push(HitRow {
                sequence_id: id.to_string(),
                accession: acc.to_string(),
                length: *len,
            });
        }
        let dict: AccessionGeneMap = dict
            .iter()
            .map(|(a, g)| (a.to_string(), g.to_string()))
            .collect();
        let policy = SymbolPolicy::default();
        let assignments = BestHitResolver::new(&dict, &policy).resolve_all(&hits);
        (hits, assignments)
    }

    #[test]
    fn test_longest_wins() {
        let (hits, assignments) = setup(
            &[("seq3", "a", 500), ("seq4", "a", 1200)],
            &[("a", "GENE1")],
        );
        let reps = select_representatives(hits.lengths(), &assignments);
        assert_eq!(reps.len(), 1);
        assert_eq!(reps.get("GENE1"), Some("seq4"));
    }

    #[test]
    fn test_equal_length_keeps_first() {
        let (hits, assignments) = setup(
            &[("s1", "a", 800), ("s2", "a", 800), ("s3", "a", 799)],
            &[("a", "GENE1")],
        );
        let reps = select_representatives(hits.lengths(), &assignments);
        assert_eq!(reps.get("GENE1"), Some("s1"));
    }

    #[test]
    fn test_one_representative_per_gene() {
        let (hits, assignments) = setup(
            &[
                ("s1", "a", 100),
                ("s2", "b", 300),
                ("s3", "a", 200),
                ("s4", "unknown", 5000),
                ("s5", "c", 50),
            ],
            &[("a", "GENE1"), ("b", "LOC7"), ("c", "GENE1")],
        );
        let reps = select_representatives(hits.lengths(), &assignments);
        assert_eq!(
            reps.iter().collect::<Vec<_>>(),
            vec![("GENE1", "s3"), ("LOC7", "s2")]
        );

        let core = reps.core_ids();
        assert!(core.contains("s3"));
        assert!(!core.contains("s4"));
        assert_eq!(core.len(), 2);
    }

    #[test]
    fn test_zero_length_never_selected() {
        let (hits, assignments) = setup(&[("s1", "a", 0)], &[("a", "GENE1")]);
        let reps = select_representatives(hits.lengths(), &assignments);
        assert!(reps.is_empty());
    }

    #[test]
    fn test_selection_is_idempotent() {
        let (hits, assignments) = setup(
            &[("s1", "a", 10), ("s2", "b", 20), ("s3", "b", 30)],
            &[("a", "G1"), ("b", "G2")],
        );
        let first = select_representatives(hits.lengths(), &assignments);
        let second = select_representatives(hits.lengths(), &assignments);
        assert_eq!(first, second);
    }
}
