//! CDS and Protein Extraction
//!
//! Cuts predicted coding regions out of assembled transcripts and writes
//! them, and/or their translations, as FASTA.
//!
//! # Inputs
//! - Transcript metadata CSV: `sequence_id`, `cds_ids` (`;`-separated, may be
//!   empty) plus any columns referenced by the transcript filters
//! - CDS metadata CSV: `cds_id`, `start`, `end`, `strand`, optionally `gene`,
//!   plus any columns referenced by the CDS filters
//! - The assembly FASTA the coordinates refer to
//!
//! # Failure Handling
//! A CDS id listed for a transcript but absent from the CDS metadata aborts
//! the run with `MissingCoordinate`. A CDS that cannot be translated is still
//! written to the CDS output, its protein is skipped and counted. A CDS row
//! with a bad coordinate or a strand other than `+`/`-` is a
//! `MalformedRecord`.

use anyhow::{bail, Context, Result};
use csv::StringRecord;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::config::ExtractionFilters;
use crate::error::TatatError;
use crate::seqio::{FastaChunk, FastaFile, FastaWriter};
use crate::translate::{CodingSpan, CodonTranslator, Strand};

// ============================================================================
// Metadata Tables
// ============================================================================

/// Coordinates and gene name of one CDS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdsFeature {
    pub span: CodingSpan,
    /// Empty when the metadata has no gene for this CDS.
    pub gene: String,
}

struct CsvTable {
    source: String,
    columns: FxHashMap<String, usize>,
    reader: csv::Reader<std::fs::File>,
}

impl CsvTable {
    fn open(path: &Path) -> Result<Self> {
        let source = path.display().to_string();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open metadata: {}", source))?;
        let columns = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", source))?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Ok(Self { source, columns, reader })
    }

    fn column(&self, name: &str) -> Result<usize, TatatError> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| TatatError::malformed(&self.source, 1, format!("missing column '{}'", name)))
    }

    /// Resolves `column → value` filters to `(index, value)` pairs.
    fn filter(&self, filters: &BTreeMap<String, String>) -> Result<Vec<(usize, String)>, TatatError> {
        filters
            .iter()
            .map(|(name, value)| Ok((self.column(name)?, value.clone())))
            .collect()
    }
}

fn passes(record: &StringRecord, filter: &[(usize, String)]) -> bool {
    filter
        .iter()
        .all(|(idx, value)| record.get(*idx) == Some(value.as_str()))
}

fn line_of(record: &StringRecord, fallback: usize) -> usize {
    record.position().map(|p| p.line() as usize).unwrap_or(fallback)
}

/// Transcript → CDS ids for transcripts passing the transcript filters.
fn load_transcript_cds_ids(
    path: &Path,
    filters: &BTreeMap<String, String>,
) -> Result<FxHashMap<String, Vec<String>>> {
    let mut table = CsvTable::open(path)?;
    let id_idx = table.column("sequence_id")?;
    let cds_idx = table.column("cds_ids")?;
    let filter = table.filter(filters)?;

    let mut transcripts = FxHashMap::default();
    for record in table.reader.records() {
        let record = record.with_context(|| format!("Failed to read {}", table.source))?;
        if !passes(&record, &filter) {
            continue;
        }
        let cds_ids = record.get(cds_idx).unwrap_or("");
        if cds_ids.is_empty() {
            continue;
        }
        let id = record.get(id_idx).unwrap_or("").to_string();
        transcripts.insert(id, cds_ids.split(';').map(str::to_string).collect());
    }
    Ok(transcripts)
}

/// CDS features by id, plus the ids passing the CDS filters when given.
fn load_cds_features(
    path: &Path,
    filters: Option<&BTreeMap<String, String>>,
) -> Result<(FxHashMap<String, CdsFeature>, Option<FxHashSet<String>>)> {
    let mut table = CsvTable::open(path)?;
    let id_idx = table.column("cds_id")?;
    let start_idx = table.column("start")?;
    let end_idx = table.column("end")?;
    let strand_idx = table.column("strand")?;
    let gene_idx = table.columns.get("gene").copied();
    let filter = filters.map(|f| table.filter(f)).transpose()?;

    let mut features = FxHashMap::default();
    let mut passing = filter.as_ref().map(|_| FxHashSet::default());

    for (n, record) in table.reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read {}", table.source))?;
        let line = line_of(&record, n + 2);
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let coord = |idx: usize| -> Result<usize, TatatError> {
            field(idx).parse().map_err(|_| {
                TatatError::malformed(&table.source, line, format!("invalid coordinate '{}'", field(idx)))
            })
        };
        let strand = Strand::from_symbol(field(strand_idx)).ok_or_else(|| {
            TatatError::malformed(&table.source, line, format!("invalid strand '{}'", field(strand_idx)))
        })?;
        let span = CodingSpan::from_one_based(coord(start_idx)?, coord(end_idx)?, strand)
            .ok_or_else(|| TatatError::malformed(&table.source, line, "start coordinate is 0"))?;

        let id = field(id_idx).to_string();
        if let (Some(ids), Some(filter)) = (passing.as_mut(), filter.as_ref()) {
            if passes(&record, filter) {
                ids.insert(id.clone());
            }
        }
        let gene = gene_idx.map(|i| field(i).to_string()).unwrap_or_default();
        features.insert(id, CdsFeature { span, gene });
    }
    Ok((features, passing))
}

// ============================================================================
// Extraction Plan
// ============================================================================

/// Which CDSs to extract from which transcripts.
#[derive(Debug, Clone, Default)]
pub struct ExtractionPlan {
    transcripts: FxHashMap<String, Vec<String>>,
    features: FxHashMap<String, CdsFeature>,
}

impl ExtractionPlan {
    /// Loads and filters both metadata tables.
    pub fn load(transcript_metadata: &Path, cds_metadata: &Path, filters: &ExtractionFilters) -> Result<Self> {
        let mut transcripts = load_transcript_cds_ids(transcript_metadata, &filters.transcriptome_metadata)?;
        log::info!("{} transcripts pass the transcript filters", transcripts.len());

        let (features, passing) = load_cds_features(cds_metadata, filters.cds_metadata.as_ref())?;
        if let Some(passing) = passing {
            transcripts.retain(|_, cds_ids| {
                cds_ids.retain(|id| passing.contains(id));
                !cds_ids.is_empty()
            });
            log::info!("{} transcripts keep a CDS passing the CDS filters", transcripts.len());
        }
        log::info!("Loaded coordinates for {} CDSs", features.len());

        Ok(Self { transcripts, features })
    }

    pub fn new(
        transcripts: FxHashMap<String, Vec<String>>,
        features: FxHashMap<String, CdsFeature>,
    ) -> Self {
        Self { transcripts, features }
    }

    pub fn transcript_count(&self) -> usize {
        self.transcripts.len()
    }

    pub fn cds_ids(&self, transcript_id: &str) -> Option<&[String]> {
        self.transcripts.get(transcript_id).map(Vec::as_slice)
    }

    /// Feature of one CDS id.
    pub fn feature(&self, cds_id: &str) -> Result<&CdsFeature, TatatError> {
        self.features
            .get(cds_id)
            .ok_or_else(|| TatatError::MissingCoordinate { id: cds_id.to_string() })
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Counters from one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub transcripts: usize,
    pub cds_written: usize,
    pub proteins_written: usize,
    pub translation_failures: usize,
}

/// Output sinks; at least one must be present.
pub struct ExtractionOutputs<W: Write> {
    pub cds: Option<FastaWriter<W>>,
    pub aa: Option<FastaWriter<W>>,
    /// Append `;gene` to output headers.
    pub add_gene_name: bool,
}

/// Extracts and translates planned CDSs from a transcript stream.
pub fn extract<I, W>(
    records: I,
    plan: &ExtractionPlan,
    translator: &CodonTranslator<'_>,
    outputs: &mut ExtractionOutputs<W>,
) -> Result<ExtractionStats>
where
    I: IntoIterator<Item = Result<FastaChunk>>,
    W: Write,
{
    if outputs.cds.is_none() && outputs.aa.is_none() {
        bail!("Neither a CDS nor a protein output was requested");
    }

    let mut stats = ExtractionStats::default();
    for record in records {
        let record = record?;
        let Some(cds_ids) = plan.cds_ids(record.id()) else {
            continue;
        };
        stats.transcripts += 1;
        let transcript = record.sequence();

        for cds_id in cds_ids {
            let feature = plan.feature(cds_id)?;
            let gene = outputs.add_gene_name.then_some(feature.gene.as_str());
            let cds = translator.coding_sequence(&transcript, &feature.span);

            if let Some(writer) = outputs.cds.as_mut() {
                writer.write_record(cds_id, gene, &cds)?;
                stats.cds_written += 1;
            }
            if let Some(writer) = outputs.aa.as_mut() {
                match translator.translate(&cds) {
                    Ok(protein) => {
                        writer.write_record(cds_id, gene, &protein)?;
                        stats.proteins_written += 1;
                    }
                    Err(e) => {
                        log::debug!("Skipping protein of {}: {}", cds_id, e);
                        stats.translation_failures += 1;
                    }
                }
            }
        }
    }

    log::info!(
        "Extracted {} CDSs and {} proteins from {} transcripts ({} untranslatable)",
        stats.cds_written,
        stats.proteins_written,
        stats.transcripts,
        stats.translation_failures
    );
    Ok(stats)
}

/// File-to-file extraction with the standard genetic code.
pub fn extract_files(
    assembly: &Path,
    plan: &ExtractionPlan,
    cds_fasta: Option<&Path>,
    aa_fasta: Option<&Path>,
    add_gene_name: bool,
) -> Result<ExtractionStats> {
    let mut outputs = ExtractionOutputs {
        cds: cds_fasta.map(FastaWriter::create).transpose()?,
        aa: aa_fasta.map(FastaWriter::create).transpose()?,
        add_gene_name,
    };
    let stats = extract(FastaFile::open(assembly)?, plan, &CodonTranslator::default(), &mut outputs)?;

    if let Some(writer) = outputs.cds.take() {
        writer.finish()?;
    }
    if let Some(writer) = outputs.aa.take() {
        writer.finish()?;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seqio::FastaChunker;
    use std::io::Cursor;

    const ASSEMBLY: &str = ">t1\nGGGATGAAA\nTAGCC\n>t2\nATGCCCTAA\n>t3\nAAAAAA\n";

    fn write(dir: &Path, name: &str, data: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn records(data: &str) -> FastaChunker<Cursor<Vec<u8>>> {
        FastaChunker::new(Cursor::new(data.as_bytes().to_vec()), "test")
    }

    fn feature(start: usize, end: usize, strand: Strand, gene: &str) -> CdsFeature {
        CdsFeature {
            span: CodingSpan::from_one_based(start, end, strand).unwrap(),
            gene: gene.to_string(),
        }
    }

    fn run(plan: &ExtractionPlan, cds: bool, aa: bool, genes: bool) -> (ExtractionStats, String, String) {
        let mut outputs = ExtractionOutputs {
            cds: cds.then(|| FastaWriter::new(Vec::new())),
            aa: aa.then(|| FastaWriter::new(Vec::new())),
            add_gene_name: genes,
        };
        let stats = extract(records(ASSEMBLY), plan, &CodonTranslator::default(), &mut outputs).unwrap();
        let text = |w: Option<FastaWriter<Vec<u8>>>| {
            w.map(|w| String::from_utf8(w.finish().unwrap()).unwrap()).unwrap_or_default()
        };
        (stats, text(outputs.cds.take()), text(outputs.aa.take()))
    }

    fn plan() -> ExtractionPlan {
        let transcripts = [
            ("t1", vec!["c1", "c2"]),
            ("t2", vec!["c3"]),
        ]
        .into_iter()
        .map(|(t, ids)| (t.to_string(), ids.into_iter().map(String::from).collect()))
        .collect();
        let features = [
            ("c1", feature(4, 12, Strand::Forward, "GENE1")),
            ("c2", feature(1, 5, Strand::Forward, "")),
            ("c3", feature(1, 9, Strand::Reverse, "GENE3")),
        ]
        .into_iter()
        .map(|(id, f)| (id.to_string(), f))
        .collect();
        ExtractionPlan::new(transcripts, features)
    }

    #[test]
    fn test_extract_cds_and_protein() {
        let (stats, cds, aa) = run(&plan(), true, true, false);
        assert_eq!(cds, ">c1\nATGAAATAG\n>c2\nGGGAT\n>c3\nTTAGGGCAT\n");
        // c2 has a trailing fragment and is not translated
        assert_eq!(aa, ">c1\nMK*\n>c3\nLGH\n");
        assert_eq!(
            stats,
            ExtractionStats {
                transcripts: 2,
                cds_written: 3,
                proteins_written: 2,
                translation_failures: 1,
            }
        );
    }

    #[test]
    fn test_gene_names_in_headers() {
        let (_, cds, _) = run(&plan(), true, false, true);
        assert_eq!(cds, ">c1;GENE1\nATGAAATAG\n>c2\nGGGAT\n>c3;GENE3\nTTAGGGCAT\n");
    }

    #[test]
    fn test_protein_only() {
        let (stats, cds, aa) = run(&plan(), false, true, true);
        assert!(cds.is_empty());
        assert_eq!(aa, ">c1;GENE1\nMK*\n>c3;GENE3\nLGH\n");
        assert_eq!(stats.cds_written, 0);
    }

    #[test]
    fn test_missing_coordinate_is_fatal() {
        let mut transcripts = FxHashMap::default();
        transcripts.insert("t2".to_string(), vec!["ghost".to_string()]);
        let plan = ExtractionPlan::new(transcripts, FxHashMap::default());

        let mut outputs = ExtractionOutputs {
            cds: Some(FastaWriter::new(Vec::new())),
            aa: None,
            add_gene_name: false,
        };
        let err = extract(records(ASSEMBLY), &plan, &CodonTranslator::default(), &mut outputs).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TatatError>(),
            Some(TatatError::MissingCoordinate { id }) if id == "ghost"
        ));
    }

    #[test]
    fn test_requires_an_output() {
        let mut outputs: ExtractionOutputs<Vec<u8>> = ExtractionOutputs {
            cds: None,
            aa: None,
            add_gene_name: false,
        };
        assert!(extract(records(ASSEMBLY), &plan(), &CodonTranslator::default(), &mut outputs).is_err());
    }

    #[test]
    fn test_plan_from_metadata_with_filters() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = write(
            dir.path(),
            "transcripts.csv",
            "sequence_id,cds_ids,evigene_pass\nt1,c1;c2,True\nt2,c3,False\nt3,,True\nt4,c4,True\n",
        );
        let cds = write(
            dir.path(),
            "cds.csv",
            "cds_id,start,end,strand,gene,core_cds\n\
             c1,4,12,+,GENE1,True\n\
             c2,1,5,+,,\n\
             c3,1,9,-,GENE3,True\n\
             c4,2,7,-,GENE4,\n",
        );

        let filters = ExtractionFilters {
            transcriptome_metadata: [("evigene_pass".to_string(), "True".to_string())].into(),
            cds_metadata: None,
        };
        let plan = ExtractionPlan::load(&transcripts, &cds, &filters).unwrap();
        assert_eq!(plan.transcript_count(), 2);
        assert_eq!(plan.cds_ids("t1").unwrap(), ["c1", "c2"]);
        assert!(plan.cds_ids("t3").is_none());
        assert_eq!(plan.feature("c4").unwrap().span, CodingSpan::new(1, 7, Strand::Reverse));

        let filters = ExtractionFilters {
            cds_metadata: Some([("core_cds".to_string(), "True".to_string())].into()),
            ..filters
        };
        let plan = ExtractionPlan::load(&transcripts, &cds, &filters).unwrap();
        assert_eq!(plan.transcript_count(), 1);
        assert_eq!(plan.cds_ids("t1").unwrap(), ["c1"]);
        assert_eq!(plan.feature("c2").unwrap().gene, "");
    }

    #[test]
    fn test_unknown_filter_column() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = write(dir.path(), "t.csv", "sequence_id,cds_ids\nt1,c1\n");
        let cds = write(dir.path(), "c.csv", "cds_id,start,end,strand\nc1,1,3,+\n");
        let filters = ExtractionFilters {
            transcriptome_metadata: [("missing".to_string(), "x".to_string())].into(),
            cds_metadata: None,
        };
        let err = ExtractionPlan::load(&transcripts, &cds, &filters).unwrap_err();
        assert!(err.to_string().contains("missing column 'missing'"));
    }

    #[test]
    fn test_bad_coordinate_names_line() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = write(dir.path(), "t.csv", "sequence_id,cds_ids\nt1,c1\n");
        let cds = write(dir.path(), "c.csv", "cds_id,start,end,strand\nc1,1,3,+\nc2,x,3,+\n");
        let err = ExtractionPlan::load(&transcripts, &cds, &ExtractionFilters::default()).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_invalid_strand_names_line() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = write(dir.path(), "t.csv", "sequence_id,cds_ids\nt1,c1;c2\n");
        let cds = write(dir.path(), "c.csv", "cds_id,start,end,strand\nc1,1,3,-\nc2,1,3,.\n");
        let err = ExtractionPlan::load(&transcripts, &cds, &ExtractionFilters::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 3"));
        assert!(message.contains("invalid strand '.'"));
    }

    #[test]
    fn test_extract_files() {
        let dir = tempfile::tempdir().unwrap();
        let assembly = write(dir.path(), "assembly.fasta", ASSEMBLY);
        let aa = dir.path().join("aa.fasta");

        let stats = extract_files(&assembly, &plan(), None, Some(&aa), false).unwrap();
        assert_eq!(stats.proteins_written, 2);
        assert_eq!(std::fs::read_to_string(&aa).unwrap(), ">c1\nMK*\n>c3\nLGH\n");
    }
}
