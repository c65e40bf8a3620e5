//! Sequence I/O Module
//!
//! Streaming access to FASTA files, one record at a time.
//! Plain and gzip-compressed inputs are both supported.
//!
//! A record is kept the way it appears on disk: the marker line (including the
//! leading `>`) and the list of sequence lines that follow it. Nothing beyond
//! the current record is held in memory, so assemblies of any size can be
//! streamed through the translator or the deduplication filter.
//!
//! # Examples
//! ```no_run
//! use tatat::seqio::FastaFile;
//!
//! let mut reader = FastaFile::open("assembly.fasta.gz").unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{}: {} bp", record.id(), record.seq_len());
//! }
//! ```

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::TatatError;

// ============================================================================
// FASTA Record
// ============================================================================

/// One FASTA record as read from disk.
///
/// # Fields
/// - `header`: The marker line, e.g. `">17"` or `">17;GENE1"`
/// - `lines`: Sequence lines in file order, surrounding whitespace removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaChunk {
    /// Marker line including the leading '>'.
    pub header: String,
    /// Raw sequence lines.
    pub lines: Vec<String>,
}

impl FastaChunk {
    /// Sequence identifier: the header without the marker and without any
    /// `;geneSymbol` suffix.
    pub fn id(&self) -> &str {
        let body = self.header.strip_prefix('>').unwrap_or(&self.header);
        body.split(';').next().unwrap_or(body)
    }

    /// Gene symbol embedded in the header, if any.
    pub fn gene_symbol(&self) -> Option<&str> {
        self.header
            .split_once(';')
            .map(|(_, gene)| gene)
            .filter(|gene| !gene.is_empty())
    }

    /// Concatenated sequence.
    pub fn sequence(&self) -> String {
        self.lines.concat()
    }

    /// Total sequence length without materialising the sequence.
    pub fn seq_len(&self) -> usize {
        self.lines.iter().map(|l| l.len()).sum()
    }
}

// ============================================================================
// FASTA Reader
// ============================================================================

/// Lazy, single-pass FASTA record reader over any buffered source.
///
/// A record starts at every line beginning with '>'. The first marker opens
/// the first record without emitting an empty one, and the last record is
/// flushed at end of input. Blank lines are ignored; any other content before
/// the first marker is rejected as malformed.
pub struct FastaChunker<R: BufRead> {
    reader: R,
    source: String,
    line_buf: String,
    line_no: usize,
    pending_header: Option<String>,
    pending_line: usize,
    record_line: usize,
    finished: bool,
}

impl<R: BufRead> FastaChunker<R> {
    /// Wraps a buffered reader. `source` is used in diagnostics only.
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            reader,
            source: source.into(),
            line_buf: String::with_capacity(256),
            line_no: 0,
            pending_header: None,
            pending_line: 0,
            record_line: 0,
            finished: false,
        }
    }

    /// Reads the next FASTA record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - Successfully read a record
    /// - `Ok(None)` - End of input reached
    /// - `Err(e)` - I/O error or malformed input
    pub fn read_next(&mut self) -> Result<Option<FastaChunk>> {
        if self.finished {
            return Ok(None);
        }

        let mut lines = Vec::new();

        loop {
            self.line_buf.clear();
            let bytes = self
                .reader
                .read_line(&mut self.line_buf)
                .with_context(|| format!("Failed to read FASTA: {}", self.source))?;

            if bytes == 0 {
                self.finished = true;
                self.record_line = self.pending_line;
                return Ok(self
                    .pending_header
                    .take()
                    .map(|header| FastaChunk { header, lines }));
            }
            self.line_no += 1;

            let line = self.line_buf.trim();
            if line.starts_with('>') {
                let header_line = std::mem::replace(&mut self.pending_line, self.line_no);
                if let Some(header) = self.pending_header.replace(line.to_string()) {
                    self.record_line = header_line;
                    return Ok(Some(FastaChunk { header, lines }));
                }
            } else if line.is_empty() {
                continue;
            } else if self.pending_header.is_none() {
                return Err(TatatError::malformed(
                    &self.source,
                    self.line_no,
                    "sequence data before the first '>' header",
                )
                .into());
            } else {
                lines.push(line.to_string());
            }
        }
    }
}

impl<R: BufRead> FastaChunker<R> {
    /// Line number of the header of the record returned last.
    pub fn header_line(&self) -> usize {
        self.record_line
    }
}

impl<R: BufRead> Iterator for FastaChunker<R> {
    type Item = Result<FastaChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Auto-detecting FASTA file reader.
///
/// Files ending in `.gz` are decompressed on the fly.
/// Reopening the path restarts the stream from the first record.
pub enum FastaFile {
    /// Plain text FASTA file.
    Plain(FastaChunker<BufReader<File>>),
    /// Gzip-compressed FASTA file.
    Gzipped(FastaChunker<BufReader<MultiGzDecoder<File>>>),
}

impl FastaFile {
    /// Opens a FASTA file with automatic compression detection.
    ///
    /// # Arguments
    /// * `path` - Path to FASTA file (plain or .gz)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open FASTA: {}", path.display()))?;
        let source = path.display().to_string();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if ext == "gz" {
            let decoder = MultiGzDecoder::new(file);
            Ok(FastaFile::Gzipped(FastaChunker::new(
                BufReader::with_capacity(1024 * 1024, decoder),
                source,
            )))
        } else {
            Ok(FastaFile::Plain(FastaChunker::new(
                BufReader::with_capacity(1024 * 1024, file),
                source,
            )))
        }
    }

    /// Reads the next FASTA record.
    pub fn read_next(&mut self) -> Result<Option<FastaChunk>> {
        match self {
            FastaFile::Plain(r) => r.read_next(),
            FastaFile::Gzipped(r) => r.read_next(),
        }
    }

    /// Line number of the header of the record returned last.
    pub fn header_line(&self) -> usize {
        match self {
            FastaFile::Plain(r) => r.header_line(),
            FastaFile::Gzipped(r) => r.header_line(),
        }
    }
}

impl Iterator for FastaFile {
    type Item = Result<FastaChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            FastaFile::Plain(r) => r.next(),
            FastaFile::Gzipped(r) => r.next(),
        }
    }
}

// ============================================================================
// FASTA Writer
// ============================================================================

/// Writes single-line FASTA records with `>{id}` or `>{id};{gene}` headers.
pub struct FastaWriter<W: Write> {
    writer: W,
    records: usize,
}

impl FastaWriter<BufWriter<File>> {
    /// Creates (or truncates) a FASTA output file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create FASTA: {}", path.as_ref().display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FastaWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    /// Writes one record. An empty gene symbol is treated as absent.
    pub fn write_record(&mut self, id: &str, gene: Option<&str>, seq: &str) -> Result<()> {
        match gene {
            Some(gene) if !gene.is_empty() => writeln!(self.writer, ">{};{}", id, gene)?,
            _ => writeln!(self.writer, ">{}", id)?,
        }
        writeln!(self.writer, "{}", seq)?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunks(data: &str) -> Result<Vec<FastaChunk>> {
        FastaChunker::new(Cursor::new(data.as_bytes().to_vec()), "test").collect()
    }

    #[test]
    fn test_two_records() {
        let records = chunks(">1\nATCG\n>2\nGGAT\n").unwrap();
        assert_eq!(
            records,
            vec![
                FastaChunk { header: ">1".into(), lines: vec!["ATCG".into()] },
                FastaChunk { header: ">2".into(), lines: vec!["GGAT".into()] },
            ]
        );
    }

    #[test]
    fn test_last_record_flushed_without_trailing_newline() {
        let records = chunks(">a\nAC\nGT\n>b\nTT").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lines, vec!["AC", "GT"]);
        assert_eq!(records[0].sequence(), "ACGT");
        assert_eq!(records[1].sequence(), "TT");
    }

    #[test]
    fn test_empty_input_and_header_only() {
        assert!(chunks("").unwrap().is_empty());
        let records = chunks(">only\n").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].lines.is_empty());
        assert_eq!(records[0].seq_len(), 0);
    }

    #[test]
    fn test_whitespace_and_blank_lines() {
        let records = chunks("\n>x  \r\n  ACG \r\n\nTTA\r\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].header, ">x");
        assert_eq!(records[0].sequence(), "ACGTTA");
        assert_eq!(records[0].seq_len(), 6);
    }

    #[test]
    fn test_data_before_first_header_is_malformed() {
        let err = chunks("ACGT\n>1\nAC\n").unwrap_err();
        let malformed = err.downcast_ref::<TatatError>().unwrap();
        assert!(matches!(malformed, TatatError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_header_line_numbers() {
        let mut reader = FastaChunker::new(Cursor::new(b"\n>a\nAC\n\nGT\n>b\nTT\n".to_vec()), "test");
        reader.read_next().unwrap().unwrap();
        assert_eq!(reader.header_line(), 2);
        reader.read_next().unwrap().unwrap();
        assert_eq!(reader.header_line(), 6);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_id_and_gene_symbol() {
        let plain = FastaChunk { header: ">42".into(), lines: vec![] };
        assert_eq!(plain.id(), "42");
        assert_eq!(plain.gene_symbol(), None);

        let tagged = FastaChunk { header: ">42;GENE1".into(), lines: vec![] };
        assert_eq!(tagged.id(), "42");
        assert_eq!(tagged.gene_symbol(), Some("GENE1"));

        let empty_tag = FastaChunk { header: ">42;".into(), lines: vec![] };
        assert_eq!(empty_tag.gene_symbol(), None);
    }

    #[test]
    fn test_open_plain_and_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.fasta");
        std::fs::write(&plain, ">1\nAAA\n>2\nCCC\n").unwrap();

        let gz = dir.path().join("a.fasta.gz");
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        enc.write_all(b">1\nAAA\n>2\nCCC\n").unwrap();
        enc.finish().unwrap();

        let plain_ids: Vec<String> = FastaFile::open(&plain)
            .unwrap()
            .map(|r| r.unwrap().id().to_string())
            .collect();
        let gz_ids: Vec<String> = FastaFile::open(&gz)
            .unwrap()
            .map(|r| r.unwrap().id().to_string())
            .collect();
        assert_eq!(plain_ids, vec!["1", "2"]);
        assert_eq!(plain_ids, gz_ids);
    }

    #[test]
    fn test_writer_headers() {
        let mut writer = FastaWriter::new(Vec::new());
        writer.write_record("1", None, "ATG").unwrap();
        writer.write_record("2", Some("GENE1"), "MK").unwrap();
        writer.write_record("3", Some(""), "M").unwrap();
        assert_eq!(writer.records_written(), 3);

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(out, ">1\nATG\n>2;GENE1\nMK\n>3\nM\n");
    }
}
