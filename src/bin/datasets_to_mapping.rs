//! Datasets Gene Reports to Accession Mapping
//!
//! Builds the headerless `accession,gene` dictionary used by `tatat
//! assign-genes` from already-downloaded NCBI Datasets gene summaries.
//! Only accessions that occur in the hit table are kept.
//!
//! Usage:
//!   datasets_to_mapping \
//!     -b blast_results.tsv \
//!     -r datasets_batch_1.jsonl -r datasets_batch_2.jsonl \
//!     -o accession_gene_mapping.csv

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use tatat::config::AnnotationConfig;
use tatat::gene_mapping::build_mapping;
use tatat::hits::HitTable;

#[derive(Parser)]
#[command(name = "datasets_to_mapping")]
#[command(version)]
#[command(about = "Build an accession → gene symbol mapping from NCBI Datasets gene reports")]
struct Cli {
    /// Hit table whose accessions should be mapped
    #[arg(short = 'b', long, value_name = "FILE")]
    blast_results: PathBuf,

    /// `datasets summary gene` JSON-lines output (repeatable)
    #[arg(short = 'r', long = "reports", value_name = "FILE", required = true)]
    reports: Vec<PathBuf>,

    #[arg(short = 'o', long, value_name = "FILE")]
    output: PathBuf,

    /// Keep gene symbols in their original case
    #[arg(long)]
    keep_case: bool,

    /// JSON with symbol prefixes
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let config = match &cli.config {
        Some(path) => AnnotationConfig::load(path)?,
        None => AnnotationConfig::default(),
    };

    let accessions = HitTable::load(&cli.blast_results)?.accessions();
    log::info!("All accession numbers count: {}", accessions.len());

    let mapping = build_mapping(&cli.reports, &accessions, &config.symbols, !cli.keep_case)?;
    mapping.write_csv(&cli.output)?;
    log::info!("Wrote {} accessions to {}", mapping.len(), cli.output.display());
    Ok(())
}
