//! Assembly Merging
//!
//! Concatenates per-sample de novo assemblies into one FASTA with globally
//! unique integer ids, and records where each sequence came from.
//!
//! # Naming
//! Files are visited in sorted path order and records in file order; ids run
//! from 1 without gaps. The sample uid of a record is the file stem of its
//! assembly (`SRR123.fasta` → `SRR123`).
//!
//! # Headers
//! Assembler headers are `_`-joined key/value pairs, e.g.
//! `NODE_1_length_500_cov_3.256`. The `length` and `cov` keys are required;
//! coverage is rounded to two decimals.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TatatError;
use crate::seqio::{FastaFile, FastaWriter};

/// Length and k-mer coverage parsed from an assembler header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyHeader {
    pub length: u64,
    pub coverage: f64,
}

impl AssemblyHeader {
    /// Parses a header with or without the leading `>`.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.strip_prefix('>').unwrap_or(header);
        let fields: Vec<&str> = header.split('_').collect();

        let mut length = None;
        let mut coverage = None;
        for pair in fields.chunks_exact(2) {
            match pair[0] {
                "length" => length = pair[1].parse::<u64>().ok(),
                "cov" => coverage = pair[1].parse::<f64>().ok(),
                _ => {}
            }
        }

        Some(Self {
            length: length?,
            coverage: (coverage? * 100.0).round() / 100.0,
        })
    }
}

/// One row of the merged-assembly metadata table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedSequence {
    pub sequence_id: u64,
    pub sample_uid: String,
    pub length: u64,
    pub kmer_coverage: f64,
}

/// Counters from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub files: usize,
    pub sequences: u64,
}

/// Sorted list of the files in `dir`.
pub fn assembly_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read assembly directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Sample uid of an assembly file: its name up to the last extension.
fn sample_uid(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Merges every assembly in `dir` into `merged` and writes the per-sequence
/// metadata CSV to `metadata`.
pub fn merge_assemblies(dir: &Path, merged: &Path, metadata: &Path) -> Result<MergeStats> {
    let files = assembly_files(dir)?;
    log::info!("A total of {} files detected", files.len());

    let mut writer = FastaWriter::create(merged)?;
    let mut table = csv::Writer::from_path(metadata)
        .with_context(|| format!("Failed to create metadata: {}", metadata.display()))?;

    let mut stats = MergeStats::default();
    for path in &files {
        let sample = sample_uid(path);
        log::info!("Starting on sample: {}", sample);

        let mut reader = FastaFile::open(path)?;
        while let Some(record) = reader.read_next()? {
            let header = AssemblyHeader::parse(&record.header).ok_or_else(|| {
                TatatError::malformed(
                    path.display().to_string(),
                    reader.header_line(),
                    format!("header '{}' lacks length/cov fields", record.header),
                )
            })?;

            stats.sequences += 1;
            let sequence_id = stats.sequences.to_string();
            writer.write_record(&sequence_id, None, &record.sequence())?;
            table.serialize(MergedSequence {
                sequence_id: stats.sequences,
                sample_uid: sample.clone(),
                length: header.length,
                kmer_coverage: header.coverage,
            })?;
        }
        stats.files += 1;
    }

    writer.finish()?;
    table
        .flush()
        .with_context(|| format!("Failed to write metadata: {}", metadata.display()))?;

    log::info!("Merged {} sequences from {} files", stats.sequences, stats.files);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let h = AssemblyHeader::parse(">NODE_1_length_500_cov_3.256").unwrap();
        assert_eq!(h.length, 500);
        assert_eq!(h.coverage, 3.26);

        let h = AssemblyHeader::parse("NODE_12_length_81_cov_10_g3_i0").unwrap();
        assert_eq!(h.length, 81);
        assert_eq!(h.coverage, 10.0);

        assert!(AssemblyHeader::parse(">NODE_1_length_500").is_none());
        assert!(AssemblyHeader::parse(">contig1").is_none());
        assert!(AssemblyHeader::parse(">NODE_1_length_x_cov_2").is_none());
    }

    #[test]
    fn test_merge_assemblies() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("assemblies");
        fs::create_dir(&input).unwrap();
        fs::write(
            input.join("SRR2.fasta"),
            ">NODE_1_length_6_cov_2.5\nACG\nTAA\n",
        )
        .unwrap();
        fs::write(
            input.join("SRR1.fasta"),
            ">NODE_1_length_4_cov_10.004\nACGT\n>NODE_2_length_3_cov_1\nGGA\n",
        )
        .unwrap();

        let merged = dir.path().join("merged.fasta");
        let metadata = dir.path().join("metadata.csv");
        let stats = merge_assemblies(&input, &merged, &metadata).unwrap();
        assert_eq!(stats, MergeStats { files: 2, sequences: 3 });

        assert_eq!(
            fs::read_to_string(&merged).unwrap(),
            ">1\nACGT\n>2\nGGA\n>3\nACGTAA\n"
        );
        assert_eq!(
            fs::read_to_string(&metadata).unwrap(),
            "sequence_id,sample_uid,length,kmer_coverage\n\
             1,SRR1,4,10.0\n\
             2,SRR1,3,1.0\n\
             3,SRR2,6,2.5\n"
        );
    }

    #[test]
    fn test_bad_header_names_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("s.fasta"), ">NODE_1_length_4_cov_1\nACGT\n>weird\nAC\n").unwrap();

        let err = merge_assemblies(&input, &dir.path().join("m.fa"), &dir.path().join("m.csv"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("s.fasta"));
        assert!(msg.contains("line 3"));
    }
}
