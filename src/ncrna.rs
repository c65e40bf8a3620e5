//! ncRNA candidate handling.
//!
//! Candidates are transcripts without an annotated CDS. They are first
//! reduced to one copy per distinct molecule with the strand-aware
//! [`DedupFilter`], and selected subsets (core ncRNAs, cluster-passing
//! ncRNAs) are later written back out as FASTA.

use anyhow::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::Write;
use std::path::Path;

use crate::dedup::DedupFilter;
use crate::seqio::{FastaChunk, FastaFile, FastaWriter};

/// Ids of the first copy of each distinct candidate sequence in `fasta`.
pub fn retain_unique(fasta: &Path, candidates: &FxHashSet<String>) -> Result<Vec<String>> {
    log::info!("Removing ids of duplicate sequences among {} candidates", candidates.len());
    DedupFilter::new().retain_unique(FastaFile::open(fasta)?, candidates)
}

/// Writes every record whose id is in `selected`.
///
/// With `genes`, headers carry the gene symbol of the id when it has one.
///
/// # Returns
/// Number of records written.
pub fn write_selected<I, W>(
    records: I,
    selected: &FxHashSet<String>,
    genes: Option<&FxHashMap<String, String>>,
    writer: &mut FastaWriter<W>,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<FastaChunk>>,
    W: Write,
{
    let mut written = 0;
    for record in records {
        let record = record?;
        let id = record.id();
        if !selected.contains(id) {
            continue;
        }
        let gene = genes.and_then(|g| g.get(id)).map(String::as_str);
        writer.write_record(id, gene, &record.sequence())?;
        written += 1;
    }
    log::info!("Wrote {} of {} selected ncRNAs", written, selected.len());
    Ok(written)
}

/// File-to-file variant of [`write_selected`].
pub fn write_selected_file(
    assembly: &Path,
    output: &Path,
    selected: &FxHashSet<String>,
    genes: Option<&FxHashMap<String, String>>,
) -> Result<usize> {
    let mut writer = FastaWriter::create(output)?;
    let written = write_selected(FastaFile::open(assembly)?, selected, genes, &mut writer)?;
    writer.finish()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seqio::FastaChunker;
    use std::io::Cursor;

    const ASSEMBLY: &str = ">1\nACGT\nTT\n>2\nGGCC\n>3\nAACGTT\n>4\nAAAACCC\n";

    fn set(ids: &[&str]) -> FxHashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_retain_unique_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = dir.path().join("transcripts.fasta");
        // 3 is the reverse complement of 1, 4 repeats 2
        std::fs::write(&fasta, ">1\nAAC\nGTA\n>2\nGGCC\n>3\nTACGTT\n>4\nGGCC\n").unwrap();

        let kept = retain_unique(&fasta, &set(&["1", "2", "3", "4"])).unwrap();
        assert_eq!(kept, vec!["1", "2"]);
    }

    #[test]
    fn test_write_selected() {
        let records = FastaChunker::new(Cursor::new(ASSEMBLY.as_bytes().to_vec()), "test");
        let mut writer = FastaWriter::new(Vec::new());
        let written = write_selected(records, &set(&["1", "4"]), None, &mut writer).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(writer.finish().unwrap()).unwrap(),
            ">1\nACGTTT\n>4\nAAAACCC\n"
        );
    }

    #[test]
    fn test_write_selected_with_genes() {
        let records = FastaChunker::new(Cursor::new(ASSEMBLY.as_bytes().to_vec()), "test");
        let genes: FxHashMap<String, String> = [("3".to_string(), "MIR21".to_string())].into_iter().collect();
        let mut writer = FastaWriter::new(Vec::new());
        write_selected(records, &set(&["2", "3"]), Some(&genes), &mut writer).unwrap();
        assert_eq!(
            String::from_utf8(writer.finish().unwrap()).unwrap(),
            ">2\nGGCC\n>3;MIR21\nAACGTT\n"
        );
    }

    #[test]
    fn test_write_selected_file() {
        let dir = tempfile::tempdir().unwrap();
        let assembly = dir.path().join("assembly.fasta.gz");
        {
            let file = std::fs::File::create(&assembly).unwrap();
            let mut gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            gz.write_all(ASSEMBLY.as_bytes()).unwrap();
            gz.finish().unwrap();
        }
        let output = dir.path().join("ncrna.fasta");

        let written = write_selected_file(&assembly, &output, &set(&["2"]), None).unwrap();
        assert_eq!(written, 1);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), ">2\nGGCC\n");
    }
}
