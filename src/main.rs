use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tatat::cds::{self, ExtractionPlan};
use tatat::config::{AnnotationColumns, AnnotationConfig, ExtractionFilters};
use tatat::dictionary::CsvDictionary;
use tatat::hits::HitTableFile;
use tatat::merge;
use tatat::ncrna;
use tatat::pipeline::{self, AssignmentSummary};
use tatat::store::SqliteStore;

#[derive(Parser)]
#[command(name = "tatat")]
#[command(version)]
#[command(about = "Gene assignment, core sequence selection and CDS/protein extraction for transcriptome assemblies")]
#[command(long_about = r#"
tatat - Transcriptome Assembly Thinning and Annotation Toolkit

Annotates de novo transcriptome assemblies from similarity search results:
  1. Merges per-sample assemblies into one renumbered FASTA
  2. Extracts predicted CDSs and their translations
  3. Assigns each CDS / ncRNA the gene of its best resolvable search hit
  4. Marks the longest sequence of every gene as its core sequence

GENE ASSIGNMENT:
  Hits are scanned in search order. The first hit whose accession maps to a
  gene that is not provisional (LOC...) wins; otherwise the first mappable
  hit is used. Low-confidence symbols (CUN...) are accepted but marked as
  ambiguous. Prefixes can be changed with --config.

HIT TABLE FORMAT:
  Tab-separated, no header: sequence_id, accession, ..., query length

EXAMPLES:
  tatat merge-assemblies -d assemblies/ -m merged.fasta -t assembly_metadata.csv
  tatat extract-cds -a merged.fasta -t transcripts.csv -c cds.csv -e fields.json --aa-fasta aa.fasta
  tatat assign-genes -b blast.tsv -g mapping.csv -c cds.csv
  tatat assign-ncrna -b ncrna_blast.tsv -s tatat.db -t liver
"#)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assign genes to CDSs and annotate the CDS metadata CSV
    AssignGenes(AssignGenesArgs),
    /// Assign genes to the ncRNAs of one transcriptome in the SQLite store
    AssignNcrna(AssignNcrnaArgs),
    /// Extract CDS and/or protein sequences from an assembly
    ExtractCds(ExtractCdsArgs),
    /// Register deduplicated ncRNA candidates of one transcriptome
    DedupNcrna(DedupNcrnaArgs),
    /// Write core (or cluster-passing) ncRNA sequences
    ExtractNcrna(ExtractNcrnaArgs),
    /// Merge per-sample assemblies into one renumbered FASTA
    MergeAssemblies(MergeAssembliesArgs),
}

#[derive(Args)]
struct AssignGenesArgs {
    #[arg(short = 'b', long, value_name = "FILE", help_heading = "Input")]
    blast_results: PathBuf,

    #[arg(short = 'g', long, value_name = "FILE", help_heading = "Input")]
    accession_gene_mapping: PathBuf,

    /// CDS metadata CSV, rewritten in place
    #[arg(short = 'c', long, value_name = "FILE", help_heading = "Input")]
    cds_metadata: PathBuf,

    /// JSON with symbol prefixes and metadata column names
    #[arg(long, value_name = "FILE", help_heading = "Options")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct AssignNcrnaArgs {
    #[arg(short = 'b', long, value_name = "FILE", help_heading = "Input")]
    blast_results: PathBuf,

    #[arg(short = 's', long, value_name = "FILE", help_heading = "Input")]
    sqlite_db: PathBuf,

    #[arg(short = 't', long, value_name = "NAME", help_heading = "Input")]
    transcriptome: String,

    /// JSON with symbol prefixes and table column names
    #[arg(long, value_name = "FILE", help_heading = "Options")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ExtractCdsArgs {
    #[arg(short = 'a', long, value_name = "FILE", help_heading = "Input")]
    assembly_fasta: PathBuf,

    #[arg(short = 't', long, value_name = "FILE", help_heading = "Input")]
    transcript_metadata: PathBuf,

    #[arg(short = 'c', long, value_name = "FILE", help_heading = "Input")]
    cds_metadata: PathBuf,

    /// JSON with transcript and CDS metadata filters
    #[arg(short = 'e', long, value_name = "FILE", help_heading = "Input")]
    extraction_fields: PathBuf,

    #[arg(long, value_name = "FILE", help_heading = "Output")]
    cds_fasta: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help_heading = "Output")]
    aa_fasta: Option<PathBuf>,

    /// Append ";gene" to output headers
    #[arg(long, help_heading = "Output")]
    add_gene_name: bool,
}

#[derive(Args)]
struct DedupNcrnaArgs {
    #[arg(short = 's', long, value_name = "FILE", help_heading = "Input")]
    sqlite_db: PathBuf,

    #[arg(short = 'f', long, value_name = "FILE", help_heading = "Input")]
    transcripts_fasta: PathBuf,

    #[arg(short = 't', long, value_name = "NAME", help_heading = "Input")]
    transcriptome: String,

    /// Transcripts of this length or longer are not ncRNA candidates
    #[arg(long, value_name = "BP", default_value = "5000", help_heading = "Options")]
    max_length: u64,
}

#[derive(Args)]
struct ExtractNcrnaArgs {
    #[arg(short = 'a', long, value_name = "FILE", help_heading = "Input")]
    assembly_fasta: PathBuf,

    #[arg(short = 's', long, value_name = "FILE", help_heading = "Input")]
    sqlite_db: PathBuf,

    #[arg(short = 'o', long, value_name = "FILE", help_heading = "Output")]
    ncrna_fasta: PathBuf,

    /// Write core ncRNAs of this transcriptome; without it, every ncRNA
    /// passing clustering is written
    #[arg(short = 't', long, value_name = "NAME", help_heading = "Options")]
    transcriptome: Option<String>,

    #[arg(long, help_heading = "Output")]
    add_gene_name: bool,
}

#[derive(Args)]
struct MergeAssembliesArgs {
    #[arg(short = 'd', long, value_name = "DIR", help_heading = "Input")]
    assembly_fasta_dir: PathBuf,

    #[arg(short = 'm', long, value_name = "FILE", help_heading = "Output")]
    merged_path: PathBuf,

    #[arg(short = 't', long, value_name = "FILE", help_heading = "Output")]
    metadata_path: PathBuf,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_config(path: Option<&Path>, columns: AnnotationColumns) -> Result<AnnotationConfig> {
    match path {
        Some(path) => AnnotationConfig::load_with_columns(path, columns),
        None => Ok(AnnotationConfig {
            columns,
            ..Default::default()
        }),
    }
}

fn report(summary: &AssignmentSummary) {
    log::info!(
        "Assigned {}/{} sequences, {} core, {} rows written",
        summary.stats.assigned,
        summary.stats.sequences,
        summary.core_sequences,
        summary.rows_written
    );
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::AssignGenes(args) => {
            let config = load_config(args.config.as_deref(), AnnotationColumns::cds())?;
            let summary = pipeline::assign_genes_to_file(
                &HitTableFile::new(&args.blast_results),
                &CsvDictionary::new(&args.accession_gene_mapping),
                &args.cds_metadata,
                &config,
            )?;
            report(&summary);
        }
        Command::AssignNcrna(args) => {
            let config = load_config(args.config.as_deref(), AnnotationColumns::ncrna())?;
            let mut store = SqliteStore::open(&args.sqlite_db)?;
            let summary = pipeline::assign_genes_to_store(
                &HitTableFile::new(&args.blast_results),
                &mut store,
                &args.transcriptome,
                &config,
            )?;
            report(&summary);
        }
        Command::ExtractCds(args) => {
            if args.cds_fasta.is_none() && args.aa_fasta.is_none() {
                anyhow::bail!("At least one of --cds-fasta or --aa-fasta is required");
            }
            let filters = ExtractionFilters::load(&args.extraction_fields)?;
            let plan = ExtractionPlan::load(&args.transcript_metadata, &args.cds_metadata, &filters)?;
            cds::extract_files(
                &args.assembly_fasta,
                &plan,
                args.cds_fasta.as_deref(),
                args.aa_fasta.as_deref(),
                args.add_gene_name,
            )?;
        }
        Command::DedupNcrna(args) => {
            let mut store = SqliteStore::open(&args.sqlite_db)?;
            let candidates = store.ncrna_candidate_ids(&args.transcriptome, args.max_length)?;
            let unique = ncrna::retain_unique(&args.transcripts_fasta, &candidates)?;
            store.insert_ncrna_ids(&unique)?;
        }
        Command::ExtractNcrna(args) => {
            let store = SqliteStore::open(&args.sqlite_db)?;
            let selected = match &args.transcriptome {
                Some(transcriptome) => store.core_ncrna_ids(transcriptome)?,
                None => store.cd_hit_pass_ids()?,
            };
            let genes = if args.add_gene_name {
                Some(store.ncrna_gene_map()?)
            } else {
                None
            };
            ncrna::write_selected_file(&args.assembly_fasta, &args.ncrna_fasta, &selected, genes.as_ref())
                .with_context(|| format!("Failed to extract ncRNAs to {}", args.ncrna_fasta.display()))?;
        }
        Command::MergeAssemblies(args) => {
            merge::merge_assemblies(&args.assembly_fasta_dir, &args.merged_path, &args.metadata_path)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let start_time = Instant::now();
    run(cli.command)?;
    log::info!("Finished in {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(())
}
