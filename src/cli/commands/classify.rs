//! `daybook classify` — applies a label spec to an import batch's atoms,
//! either the deterministic stub or a real LLM-backed classifier.

use anyhow::Result;
use clap::{Args, ValueEnum};
use daybook_core::config::Config;
use daybook_db::Database;
use daybook_llm::{construct_backend, infer_provider, LlmClient};

use daybook_classify::{classify_batch, ClassifyMode, ClassifyRequest};

use super::print_json;

#[derive(Clone, Copy, ValueEnum)]
pub enum ClassifyModeArg {
    Stub,
    Real,
}

#[derive(Args)]
pub struct ClassifyArgs {
    #[arg(long)]
    import_batch_id: String,

    /// Model identifier; pass `stub` for the deterministic classifier.
    #[arg(long)]
    model: String,

    #[arg(long)]
    prompt_version_id: String,

    #[arg(long, value_enum, default_value_t = ClassifyModeArg::Stub)]
    mode: ClassifyModeArg,
}

pub async fn run(db: &Database, config: &Config, args: ClassifyArgs) -> Result<()> {
    let mode = match args.mode {
        ClassifyModeArg::Stub => ClassifyMode::Stub,
        ClassifyModeArg::Real => ClassifyMode::Real,
    };

    let llm = match mode {
        ClassifyMode::Stub => None,
        ClassifyMode::Real => {
            let provider = infer_provider(&args.model);
            let backend = construct_backend(
                provider,
                config.openai_api_key.as_deref(),
                config.anthropic_api_key.as_deref(),
            )?;
            Some(LlmClient::new(backend, config.llm_min_delay_ms))
        }
    };

    let outcome = classify_batch(
        db,
        &ClassifyRequest {
            import_batch_id: &args.import_batch_id,
            model: &args.model,
            prompt_version_id: &args.prompt_version_id,
            mode,
        },
        llm.as_ref(),
    )
    .await?;

    print_json(&outcome_json(&outcome))
}

fn outcome_json(outcome: &daybook_classify::ClassifyOutcome) -> serde_json::Value {
    serde_json::json!({
        "newlyLabeled": outcome.newly_labeled,
        "alreadyLabeled": outcome.already_labeled,
    })
}
