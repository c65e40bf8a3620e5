//! Gene Assignment Pipeline
//!
//! Wires the resolver, the representative selector and a metadata sink
//! together:
//!
//! ```text
//! hit table + dictionary → assignments → representatives → records → sink
//! ```
//!
//! The file-backed run annotates a CDS metadata CSV; the store-backed run
//! annotates the `ncrna` table of one transcriptome.

use anyhow::Result;
use std::path::Path;

use crate::config::AnnotationConfig;
use crate::dictionary::{AccessionGeneMap, DictionarySource};
use crate::hits::{HitSource, HitTable};
use crate::metadata::{collate, merge_into_csv, AnnotationRecord};
use crate::representative::select_representatives;
use crate::resolver::{BestHitResolver, ResolutionStats};
use crate::store::{SqliteStore, NCRNA_TABLE};
use crate::symbols::SymbolPolicy;

/// Result of one annotation pass, before it reaches a sink.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub records: Vec<AnnotationRecord>,
    pub stats: ResolutionStats,
    pub core_sequences: usize,
}

/// Counters reported by a complete run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentSummary {
    pub stats: ResolutionStats,
    pub core_sequences: usize,
    /// Metadata rows or table rows that received an annotation.
    pub rows_written: usize,
}

/// Resolves genes, picks representatives and collates the sink records.
pub fn annotate(hits: &HitTable, dictionary: &AccessionGeneMap, policy: &SymbolPolicy) -> Annotation {
    let assignments = BestHitResolver::new(dictionary, policy).resolve_all(hits);
    let representatives = select_representatives(hits.lengths(), &assignments);
    let records = collate(hits, &assignments, &representatives);

    Annotation {
        records,
        stats: assignments.stats,
        core_sequences: representatives.len(),
    }
}

/// Annotates a CSV metadata file from a hit table and a dictionary.
pub fn assign_genes_to_file<H, D>(
    hits: &H,
    dictionary: &D,
    metadata: &Path,
    config: &AnnotationConfig,
) -> Result<AssignmentSummary>
where
    H: HitSource,
    D: DictionarySource,
{
    let hits = hits.load_hits()?;
    let dictionary = dictionary.load_dictionary()?;

    let annotation = annotate(&hits, &dictionary, &config.symbols);
    log::info!("Core sequence count: {}", annotation.core_sequences);

    let rows_written = merge_into_csv(metadata, &config.columns, &annotation.records)?;
    Ok(AssignmentSummary {
        stats: annotation.stats,
        core_sequences: annotation.core_sequences,
        rows_written,
    })
}

/// Annotates the ncRNA table of one transcriptome.
///
/// Hits for sequences outside `transcriptome` are discarded before
/// resolution, so representatives are chosen per transcriptome.
pub fn assign_genes_to_store<H: HitSource>(
    hits: &H,
    store: &mut SqliteStore,
    transcriptome: &str,
    config: &AnnotationConfig,
) -> Result<AssignmentSummary> {
    let mut hits = hits.load_hits()?;
    let keep = store.transcriptome_ncrna_ids(transcriptome)?;
    hits.retain_ids(&keep);
    log::info!("{} searched sequences belong to {}", hits.len(), transcriptome);

    let dictionary = store.load_dictionary()?;
    let annotation = annotate(&hits, &dictionary, &config.symbols);
    log::info!("Core ncRNA count: {}", annotation.core_sequences);

    let rows_written = store.update_annotations(NCRNA_TABLE, &config.columns, &annotation.records)?;
    Ok(AssignmentSummary {
        stats: annotation.stats,
        core_sequences: annotation.core_sequences,
        rows_written,
    })
}
