//! Annotation records and the delimited-file metadata sink.
//!
//! Every sequence of the hit table yields one [`AnnotationRecord`], whether
//! or not a gene could be assigned. The CSV sink merges those records into an
//! existing metadata file keyed by sequence id:
//!
//! - new columns are appended after the existing ones
//! - existing columns of the same name are overwritten
//! - rows without a record get empty values in the annotation columns
//!
//! The merged table is written to a temporary file next to the original and
//! renamed over it, so readers never observe a half-written file.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rustc_hash::FxHashMap;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::config::AnnotationColumns;
use crate::error::TatatError;
use crate::hits::HitTable;
use crate::representative::RepresentativeSet;
use crate::resolver::Assignments;

// ============================================================================
// Annotation Records
// ============================================================================

/// Sink-ready annotation of one searched sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub id: String,
    /// Assigned accession, or the first candidate for unassigned sequences.
    pub accession: String,
    pub gene_symbol: Option<String>,
    pub unambiguous: Option<bool>,
    /// Representative flag; `None` when no gene was assigned.
    pub core: Option<bool>,
}

impl AnnotationRecord {
    /// Values for the four annotation columns as written to a CSV file.
    ///
    /// Booleans render as `True`/`False`; the core flag is `True` or empty.
    pub fn csv_values(&self) -> [String; 4] {
        [
            self.accession.clone(),
            self.gene_symbol.clone().unwrap_or_default(),
            self.unambiguous.map(bool_str).unwrap_or_default(),
            match self.core {
                Some(true) => bool_str(true),
                _ => String::new(),
            },
        ]
    }
}

fn bool_str(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

/// Builds one record per hit-table sequence, in hit-table order.
pub fn collate(
    hits: &HitTable,
    assignments: &Assignments,
    representatives: &RepresentativeSet,
) -> Vec<AnnotationRecord> {
    let core_ids = representatives.core_ids();

    hits.iter()
        .map(|(id, candidates)| match assignments.get(id) {
            Some(assignment) => AnnotationRecord {
                id: id.to_string(),
                accession: assignment.accession.clone(),
                gene_symbol: Some(assignment.gene_symbol.clone()),
                unambiguous: Some(assignment.unambiguous),
                core: Some(core_ids.contains(id)),
            },
            None => AnnotationRecord {
                id: id.to_string(),
                accession: candidates.first().cloned().unwrap_or_default(),
                gene_symbol: None,
                unambiguous: None,
                core: None,
            },
        })
        .collect()
}

// ============================================================================
// CSV Sink
// ============================================================================

/// Merges annotation records into the CSV metadata file at `path`.
///
/// # Returns
/// Number of metadata rows that received a record.
pub fn merge_into_csv<P: AsRef<Path>>(
    path: P,
    columns: &AnnotationColumns,
    records: &[AnnotationRecord],
) -> Result<usize> {
    let path = path.as_ref();
    let source = path.display().to_string();

    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open metadata: {}", source))?;
    let mut header: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read metadata header: {}", source))?
        .iter()
        .map(str::to_string)
        .collect();

    let key_idx = header
        .iter()
        .position(|h| h == &columns.key)
        .ok_or_else(|| {
            TatatError::malformed(&source, 1, format!("missing key column '{}'", columns.key))
        })?;

    let mut field_idx = [0usize; 4];
    for (slot, name) in field_idx.iter_mut().zip(columns.fields()) {
        *slot = match header.iter().position(|h| h == name) {
            Some(i) => i,
            None => {
                header.push(name.to_string());
                header.len() - 1
            }
        };
    }

    let by_id: FxHashMap<&str, &AnnotationRecord> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    log::debug!("Writing merged metadata to {}", tmp.path().display());
    let mut updated = 0usize;
    {
        let mut writer = WriterBuilder::new().from_writer(tmp.as_file_mut());
        writer.write_record(&header)?;

        let mut row = StringRecord::new();
        let mut values: Vec<String> = Vec::with_capacity(header.len());
        while reader
            .read_record(&mut row)
            .with_context(|| format!("Failed to read metadata row: {}", source))?
        {
            values.clear();
            values.extend(row.iter().map(str::to_string));
            values.resize(header.len(), String::new());

            let new_values = match by_id.get(&values[key_idx][..]) {
                Some(record) => {
                    updated += 1;
                    record.csv_values()
                }
                None => Default::default(),
            };
            for (idx, value) in field_idx.iter().zip(new_values) {
                values[*idx] = value;
            }
            writer.write_record(&values)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write merged metadata for {}", source))?;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to replace metadata: {}", source))?;

    log::info!("Annotated {} of the rows in {}", updated, source);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::AccessionGeneMap;
    use crate::hits::HitRow;
    use crate::representative::select_representatives;
    use crate::resolver::BestHitResolver;
    use crate::symbols::SymbolPolicy;

    fn records() -> Vec<AnnotationRecord> {
        let mut hits = HitTable::default();
        for (id, acc, len) in [
            ("c1", "accA", 300),
            ("c1", "accB", 300),
            ("c2", "accB", 900),
            ("c3", "accX", 100),
            ("c4", "accL", 50),
        ] {
            hits.push(HitRow {
                sequence_id: id.to_string(),
                accession: acc.to_string(),
                length: len,
            });
        }
        let dict: AccessionGeneMap = [("accB", "GENE1"), ("accL", "LOC5")]
            .iter()
            .map(|(a, g)| (a.to_string(), g.to_string()))
            .collect();
        let policy = SymbolPolicy::default();
        let assignments = BestHitResolver::new(&dict, &policy).resolve_all(&hits);
        let reps = select_representatives(hits.lengths(), &assignments);
        collate(&hits, &assignments, &reps)
    }

    #[test]
    fn test_collate() {
        let records = records();
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].id, "c1");
        assert_eq!(records[0].accession, "accB");
        assert_eq!(records[0].core, Some(false));

        assert_eq!(records[1].core, Some(true));
        assert_eq!(records[1].unambiguous, Some(true));

        // unassigned keeps its first candidate
        assert_eq!(
            records[2],
            AnnotationRecord {
                id: "c3".to_string(),
                accession: "accX".to_string(),
                gene_symbol: None,
                unambiguous: None,
                core: None,
            }
        );

        assert_eq!(records[3].gene_symbol.as_deref(), Some("LOC5"));
        assert_eq!(records[3].unambiguous, Some(false));
        assert_eq!(records[3].core, Some(true));
    }

    #[test]
    fn test_csv_values() {
        let records = records();
        assert_eq!(records[0].csv_values(), ["accB", "GENE1", "True", ""].map(String::from));
        assert_eq!(records[1].csv_values(), ["accB", "GENE1", "True", "True"].map(String::from));
        assert_eq!(records[2].csv_values(), ["accX", "", "", ""].map(String::from));
        assert_eq!(records[3].csv_values(), ["accL", "LOC5", "False", "True"].map(String::from));
    }

    #[test]
    fn test_merge_appends_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cds_metadata.csv");
        std::fs::write(&path, "cds_id,start,end\nc1,1,300\nc9,4,90\nc3,1,100\n").unwrap();

        let updated = merge_into_csv(&path, &AnnotationColumns::cds(), &records()).unwrap();
        assert_eq!(updated, 2);

        let merged = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            merged,
            "cds_id,start,end,accession_number,gene,unambiguous_gene,core_cds\n\
             c1,1,300,accB,GENE1,True,\n\
             c9,4,90,,,,\n\
             c3,1,100,accX,,,\n"
        );
        // no stray temporary files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_merge_overwrites_existing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.csv");
        std::fs::write(&path, "gene,cds_id\nOLD,c2\nOLD,c7\n").unwrap();

        merge_into_csv(&path, &AnnotationColumns::cds(), &records()).unwrap();
        let merged = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            merged,
            "gene,cds_id,accession_number,unambiguous_gene,core_cds\n\
             GENE1,c2,accB,True,True\n\
             ,c7,,,\n"
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.csv");
        std::fs::write(&path, "cds_id\nc1\nc2\nc4\n").unwrap();

        merge_into_csv(&path, &AnnotationColumns::cds(), &records()).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        merge_into_csv(&path, &AnnotationColumns::cds(), &records()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_merge_missing_key_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.csv");
        std::fs::write(&path, "id,start\nc1,1\n").unwrap();

        let err = merge_into_csv(&path, &AnnotationColumns::cds(), &records()).unwrap_err();
        assert!(err.to_string().contains("cds_id"));
        // original left untouched
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,start\nc1,1\n");
    }
}
