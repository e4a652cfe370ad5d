//! CLI commands for f1db-api.
//!
//! Supports API server mode, full and single-file dataset loads, sequence
//! repair and store statistics.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::ingest::{
    load_file, plan_step, run_pipeline, EntityOutcome, LoadSummary, PipelineOptions, RunReport,
};
use crate::models::EntityKind;
use crate::storage::{reconcile_sequences, Repository, SequenceReport};

#[derive(Parser)]
#[command(name = "f1db-api")]
#[command(version, about = "F1DB: Formula 1 statistics store and CSV loader", long_about = None)]
pub struct Cli {
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load every dataset CSV in dependency order
    Load {
        /// Directory containing the dataset CSV files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Reload entities already marked as loaded
        #[arg(long)]
        force: bool,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Load a single CSV file into one entity table
    LoadFile {
        /// Entity to load (drivers, lap_times, ...)
        entity: EntityKind,

        /// CSV file path
        file: PathBuf,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Reset auto-increment counters to the largest stored keys
    Reconcile,

    /// Show row counts and foreign key violations
    Stats,
}

/// Run the full orchestrated load.
pub fn run_load(
    config: &AppConfig,
    data_dir: Option<PathBuf>,
    force: bool,
    format: String,
) -> anyhow::Result<()> {
    let repo = Repository::new(&config.database.path)?;
    let opts = PipelineOptions {
        data_dir: data_dir.unwrap_or_else(|| config.loader.data_dir.clone()),
        force,
        load: config.loader.load_options(),
    };

    eprintln!("Loading dataset from: {}", opts.data_dir.display());
    eprintln!("Database: {}", config.database.path.display());
    let report = run_pipeline(&repo, &opts);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "table" => print_run_table(&report, config.loader.error_sample_limit),
        _ => {
            eprintln!("Unknown format: {}. Using JSON.", format);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Load one file synchronously.
pub fn run_load_file(
    config: &AppConfig,
    entity: EntityKind,
    file: PathBuf,
    format: String,
) -> anyhow::Result<()> {
    let repo = Repository::new(&config.database.path)?;

    let step = plan_step(entity)
        .ok_or_else(|| anyhow::anyhow!("No load step for {}", entity))?;

    eprintln!("Loading {} from: {}", entity, file.display());
    let summary = load_file(&repo, step, &file, &config.loader.load_options())?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_summary_table(&summary),
    }

    Ok(())
}

/// Run sequence reconciliation alone.
pub fn run_reconcile(config: &AppConfig) -> anyhow::Result<()> {
    let repo = Repository::new(&config.database.path)?;
    let reports = reconcile_sequences(repo.conn());
    print_sequence_table(&reports);

    let failures = reports.iter().filter(|r| r.error.is_some()).count();
    if failures > 0 {
        anyhow::bail!("{} table(s) could not be reconciled", failures);
    }
    Ok(())
}

/// Print store statistics.
pub fn run_stats(config: &AppConfig) -> anyhow::Result<()> {
    let repo = Repository::new(&config.database.path)?;

    println!("=== Store Statistics ===");
    println!();
    println!("  {:24} {:>10} {:>10}", "Table", "Rows", "Next id");
    println!("  {}", "-".repeat(46));
    for (kind, rows) in repo.table_counts()? {
        println!(
            "  {:24} {:>10} {:>10}",
            kind.table(),
            rows,
            repo.next_id(kind)?
        );
    }
    println!();
    println!(
        "  Foreign key violations: {}",
        repo.foreign_key_violations()?
    );

    Ok(())
}

fn outcome_label(outcome: &EntityOutcome) -> String {
    match outcome {
        EntityOutcome::Loaded(summary) => format!("loaded ({:?})", summary.state()),
        EntityOutcome::AlreadyLoaded { existing } => {
            format!("skipped, already loaded ({} rows)", existing)
        }
        EntityOutcome::SourceMissing { path } => format!("missing {}", path.display()),
        EntityOutcome::Failed { error } => format!("failed: {}", error),
    }
}

/// Print a full load report in table format.
fn print_run_table(report: &RunReport, error_limit: usize) {
    println!("=== Load Results ===");
    println!();
    println!(
        "  {:24} {:>8} {:>8} {:>8}  {}",
        "Entity", "Loaded", "Failed", "Skipped", "Outcome"
    );
    println!("  {}", "-".repeat(72));
    for entity in &report.entities {
        let (success, failed, skipped) = match &entity.outcome {
            EntityOutcome::Loaded(s) => (s.success, s.failed, s.skipped),
            _ => (0, 0, 0),
        };
        println!(
            "  {:24} {:>8} {:>8} {:>8}  {}",
            entity.entity.name(),
            success,
            failed,
            skipped,
            outcome_label(&entity.outcome)
        );
    }
    println!();
    println!("  Total new rows: {}", report.total_loaded());
    println!("  Elapsed:        {:.1}s", report.elapsed.as_secs_f64());

    let errors = report.errors(error_limit);
    if !errors.is_empty() {
        println!();
        println!("Row errors (first {}):", errors.len());
        for error in errors {
            println!("  {}", error);
        }
    }

    println!();
    print_sequence_table(&report.sequences);
}

/// Print a single-entity load summary.
fn print_summary_table(summary: &LoadSummary) {
    println!("=== {} ===", summary.entity);
    println!("  Loaded:   {}", summary.success);
    println!("  Failed:   {}", summary.failed);
    println!("  Skipped:  {}", summary.skipped);
    if !summary.errors.is_empty() {
        println!();
        println!("Row errors:");
        for error in &summary.errors {
            println!("  {}", error);
        }
    }
}

fn print_sequence_table(reports: &[SequenceReport]) {
    println!("Sequences:");
    for report in reports {
        match (&report.next_id, &report.error) {
            (_, Some(error)) => println!("  {:24} error: {}", report.table, error),
            (Some(next_id), None) => println!("  {:24} next id {}", report.table, next_id),
            (None, None) => println!("  {:24} -", report.table),
        }
    }
}
