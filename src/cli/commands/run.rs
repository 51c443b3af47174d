//! `daybook run create` / `daybook run tick` — the run lifecycle's two
//! externally driven operations. A run advances by being ticked repeatedly
//! (by a scheduler, a cron job, or a human re-running this command); there
//! is no long-lived orchestrator process in this crate.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use daybook_core::config::Config;
use daybook_core::model::LabelSpec;
use daybook_db::repo::RunRepo;
use daybook_db::Database;
use daybook_llm::{construct_backend, infer_provider, STUB_MODEL};
use daybook_run::{create_run, CreateRunRequest};
use daybook_tick::process_tick;

use super::print_json;

#[derive(Subcommand)]
pub enum RunCommands {
    /// Freeze a configuration and queue one job per eligible day.
    Create(CreateArgs),
    /// Advance a run by up to `--max-jobs` queued jobs.
    Tick(TickArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Repeatable; at least one required. Back-compat single-id form is not
    /// exposed here since the CLI always has the full list in hand.
    #[arg(long = "import-batch-id", required = true)]
    import_batch_ids: Vec<String>,

    #[arg(long)]
    start_date: String,

    #[arg(long)]
    end_date: String,

    #[arg(long = "source", required = true)]
    sources: Vec<String>,

    #[arg(long)]
    filter_profile_id: String,

    /// Explicit label spec model; must be given together with
    /// `--label-prompt-version-id`, or omitted entirely to let `create_run`
    /// resolve the most recently active classify prompt version.
    #[arg(long, requires = "label_prompt_version_id")]
    label_model: Option<String>,

    #[arg(long, requires = "label_model")]
    label_prompt_version_id: Option<String>,

    #[arg(long)]
    max_input_tokens: Option<usize>,

    #[arg(long)]
    max_usd_per_run: Option<f64>,

    #[arg(long)]
    max_usd_per_day: Option<f64>,
}

#[derive(Args)]
pub struct TickArgs {
    #[arg(long)]
    run_id: String,

    #[arg(long, default_value_t = 1)]
    max_jobs: usize,
}

pub async fn run(db: &Database, config: &Config, command: RunCommands) -> Result<()> {
    match command {
        RunCommands::Create(args) => create(db, args).await,
        RunCommands::Tick(args) => tick(db, config, args).await,
    }
}

async fn create(db: &Database, args: CreateArgs) -> Result<()> {
    let label_spec = match (args.label_model, args.label_prompt_version_id) {
        (Some(model), Some(prompt_version_id)) => Some(LabelSpec { model, prompt_version_id }),
        _ => None,
    };

    let outcome = create_run(
        db,
        &CreateRunRequest {
            import_batch_id: None,
            import_batch_ids: Some(&args.import_batch_ids),
            start_date: &args.start_date,
            end_date: &args.end_date,
            sources: &args.sources,
            label_spec,
            filter_profile_id: &args.filter_profile_id,
            max_input_tokens: args.max_input_tokens,
            max_usd_per_run: args.max_usd_per_run,
            max_usd_per_day: args.max_usd_per_day,
        },
    )
    .await?;

    print_json(&serde_json::json!({
        "runId": outcome.run.id,
        "status": outcome.run.status,
        "eligibleDayCount": outcome.eligible_day_count,
    }))
}

async fn tick(db: &Database, config: &Config, args: TickArgs) -> Result<()> {
    let run = RunRepo::get(&db.pool, &args.run_id)
        .await?
        .with_context(|| format!("run {} not found", args.run_id))?;

    let model = run.config.pricing_snapshot.model.clone();
    let backend: Box<dyn daybook_llm::LlmBackend> = if model == STUB_MODEL {
        Box::new(daybook_llm::StubBackend)
    } else {
        let provider = infer_provider(&model);
        construct_backend(provider, config.openai_api_key.as_deref(), config.anthropic_api_key.as_deref())?
    };

    let outcome = process_tick(db, &args.run_id, args.max_jobs, backend, config.llm_min_delay_ms).await?;

    print_json(&serde_json::json!({
        "runId": outcome.run_id,
        "runStatus": outcome.run_status,
        "jobsProcessed": outcome.jobs_processed,
    }))
}
