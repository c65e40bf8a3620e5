//! tatat - Transcriptome Assembly Thinning and Annotation Toolkit
//!
//! Resolves assembled transcripts, CDSs and ncRNAs to genes from similarity
//! search hits, selects one core sequence per gene, and extracts coding and
//! protein sequences from assemblies.
//!
//! # Modules
//! - `seqio`: Streaming FASTA reading (plain/gzip) and writing
//! - `hits`: Tabular search-hit parsing into per-sequence candidate lists
//! - `dictionary`: Accession → gene symbol dictionary
//! - `symbols`: Provisional/low-confidence gene symbol policy
//! - `resolver`: Best-hit gene assignment
//! - `representative`: Longest-sequence-per-gene selection
//! - `translate`: Coding span extraction and codon translation
//! - `dedup`: Strand-aware content-hash deduplication
//! - `metadata`: Annotation records and the CSV metadata sink
//! - `store`: SQLite metadata sink and queries
//! - `pipeline`: End-to-end gene assignment runs
//! - `cds`: CDS/protein extraction from assemblies
//! - `ncrna`: ncRNA candidate dedup and extraction
//! - `merge`: Per-sample assembly merging
//! - `gene_mapping`: Dictionary building from NCBI Datasets gene reports
//! - `config`: Run configuration
//! - `error`: Pipeline error types

pub mod cds;
pub mod config;
pub mod dedup;
pub mod dictionary;
pub mod error;
pub mod gene_mapping;
pub mod hits;
pub mod merge;
pub mod metadata;
pub mod ncrna;
pub mod pipeline;
pub mod representative;
pub mod resolver;
pub mod seqio;
pub mod store;
pub mod symbols;
pub mod translate;
