//! Command-line interface for daybook.
//!
//! Grounded on the teacher's `cli.rs`/`cli/args.rs`/`cli/run.rs` split: a
//! `clap`-derived `Cli`/`Commands` pair owns argument parsing, `run()` owns
//! process wiring (config, logging, DB connection) and dispatch, and each
//! subcommand gets its own module under `cli::commands`. Unlike the
//! teacher's single monolithic tool, each subcommand maps directly onto one
//! of the core pipeline operations (§6): `import`, `classify`, `run create`,
//! `run tick`, `export`, `search`.

pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use daybook_core::config::ConfigBuilder;
use daybook_core::error::DaybookError;
use daybook_db::Database;

use commands::{classify, export, import, run as run_cmd, search};

#[derive(Parser)]
#[command(name = "daybook")]
#[command(version)]
#[command(about = "Turns exported AI-chat transcripts into auditable per-day journal summaries")]
#[command(long_about = r#"
daybook is a deterministic pipeline: ingest normalised chat messages into
content-addressed atoms, classify them against a label spec, bundle and
summarize them per day under a frozen run configuration, and render a
byte-stable export tree fit for committing to a repository.

EXAMPLES:
  # Ingest a normalised message stream exported by a vendor-format parser
  daybook import --input messages.json --timezone America/New_York

  # Label a batch's atoms with the deterministic stub classifier
  daybook classify --import-batch-id <id> --model stub --prompt-version-id <id> --mode stub

  # Create a run over a date range and advance it one tick at a time
  daybook run create --import-batch-id <id> --start-date 2024-01-01 --end-date 2024-01-31 \
      --source chatgpt --filter-profile-id <id>
  daybook run tick --run-id <id>

  # Render the byte-stable export tree once the run has completed
  daybook export --run-id <id> --out-dir ./journal
"#)]
pub struct Cli {
    /// Path to the `daybook.toml` config overlay. Defaults to `./daybook.toml`.
    #[arg(long, global = true)]
    pub config: Option<camino::Utf8PathBuf>,

    /// Override the configured/ default database URL.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a normalised message stream into deduplicated atoms.
    Import(import::ImportArgs),
    /// Apply a label spec to an import batch's atoms.
    Classify(classify::ClassifyArgs),
    /// Create or advance a run.
    Run {
        #[command(subcommand)]
        command: run_cmd::RunCommands,
    },
    /// Render a completed run's byte-stable export tree.
    Export(export::ExportArgs),
    /// Full-text search over atoms or outputs.
    Search(search::SearchArgs),
}

/// Parses arguments, wires up config/logging/DB, dispatches to the matching
/// subcommand, and maps the result to a process exit code.
///
/// Exit codes (coarse, mirroring [`DaybookError::http_status_hint`]):
/// 0 success, 2 invalid input / not found, 3 conflict (retriable), 4 export
/// precondition, 5 LLM/budget/pricing error, 6 provider error, 1 anything
/// else (config, database, unexpected).
pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = ConfigBuilder::new();
    if let Some(path) = &cli.config {
        builder = builder.with_overlay_path(path.clone());
    }
    let mut config = match builder.build() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }

    crate::logging::init(config.log_format);

    let db = match Database::connect(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("error: failed to connect to database: {e}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Import(args) => import::run(&db, args).await,
        Commands::Classify(args) => classify::run(&db, &config, args).await,
        Commands::Run { command } => run_cmd::run(&db, &config, command).await,
        Commands::Export(args) => export::run(&db, args).await,
        Commands::Search(args) => search::run(&db, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn exit_code_for(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<DaybookError>() {
        Some(DaybookError::InvalidInput { .. })
        | Some(DaybookError::NotFound { .. })
        | Some(DaybookError::NoEligibleDays { .. })
        | Some(DaybookError::TimezoneMismatch { .. })
        | Some(DaybookError::ExportNotFound { .. }) => 2,
        Some(DaybookError::Conflict { .. }) | Some(DaybookError::TickInProgress { .. }) => 3,
        Some(DaybookError::ExportPrecondition { .. }) => 4,
        Some(DaybookError::UnknownModelPricing { .. })
        | Some(DaybookError::BudgetExceeded { .. })
        | Some(DaybookError::MissingApiKey { .. })
        | Some(DaybookError::LlmBadOutput { .. }) => 5,
        Some(DaybookError::LlmProvider { .. }) => 6,
        _ => 1,
    }
}
