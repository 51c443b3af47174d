//! `daybook export` — renders a completed run's byte-stable export tree and
//! writes it under `--out-dir`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use chrono::Utc;
use clap::{Args, ValueEnum};
use daybook_db::Database;
use daybook_export::{build_export_input, render_export, ExportOptions, PreviousManifestInput, PreviousTopicSummary};

use crate::fs_write::write_file_atomic;

use super::print_json;

#[derive(Clone, Copy, ValueEnum)]
pub enum PrivacyTierArg {
    Private,
    Public,
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(long)]
    run_id: String,

    /// Directory the rendered tree is written into; created if missing.
    #[arg(long)]
    out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = PrivacyTierArg::Private)]
    privacy_tier: PrivacyTierArg,

    /// Enables V2 (`topics/`, `changelog.md`); the only defined value is
    /// `topic_v1`.
    #[arg(long)]
    topic_version: Option<String>,

    /// Path to a prior export's `manifest.json` (the whole file, not just
    /// its `topics` object), feeding `changelog.md`'s diff. Requires
    /// `--topic-version`.
    #[arg(long, requires = "topic_version")]
    previous_manifest: Option<PathBuf>,
}

/// Pulls `topics` back out of a previously rendered `manifest.json`
/// (`{topicId: {displayName, category, atomCount, days}}`) into the shape
/// [`PreviousManifestInput`] expects, so the round trip a real export→commit→
/// re-export workflow needs is "pass back the file you already have" rather
/// than a hand-built intermediate format.
fn previous_manifest_from_file(path: &std::path::Path) -> Result<PreviousManifestInput> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let manifest: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {} as JSON", path.display()))?;
    let topics_obj = manifest
        .get("topics")
        .and_then(|v| v.as_object())
        .with_context(|| format!("{} has no top-level \"topics\" object", path.display()))?;

    let topics = topics_obj
        .iter()
        .map(|(topic_id, value)| -> Result<PreviousTopicSummary> {
            Ok(PreviousTopicSummary {
                topic_id: topic_id.clone(),
                display_name: value
                    .get("displayName")
                    .and_then(|v| v.as_str())
                    .with_context(|| format!("topic {topic_id} missing displayName"))?
                    .to_string(),
                category: value
                    .get("category")
                    .and_then(|v| v.as_str())
                    .with_context(|| format!("topic {topic_id} missing category"))?
                    .to_string(),
                atom_count: value
                    .get("atomCount")
                    .and_then(|v| v.as_i64())
                    .with_context(|| format!("topic {topic_id} missing atomCount"))?,
                days: value
                    .get("days")
                    .and_then(|v| v.as_array())
                    .with_context(|| format!("topic {topic_id} missing days"))?
                    .iter()
                    .map(|d| d.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .with_context(|| format!("topic {topic_id} has a non-string day"))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PreviousManifestInput { topics })
}

pub async fn run(db: &Database, args: ExportArgs) -> Result<()> {
    let privacy_tier = match args.privacy_tier {
        PrivacyTierArg::Private => daybook_export::PrivacyTier::Private,
        PrivacyTierArg::Public => daybook_export::PrivacyTier::Public,
    };

    let previous_manifest = args
        .previous_manifest
        .as_deref()
        .map(previous_manifest_from_file)
        .transpose()?;

    let options = ExportOptions {
        privacy_tier,
        topic_version: args.topic_version,
        previous_manifest,
    };

    let input = build_export_input(db, &args.run_id, options, Utc::now()).await?;
    let files = render_export(&input)?;

    let out_dir = Utf8PathBuf::from_path_buf(args.out_dir.clone())
        .map_err(|p| anyhow::anyhow!("--out-dir {} is not valid UTF-8", p.display()))?;
    for (relative_path, content) in &files {
        write_file_atomic(&out_dir.join(relative_path.as_str()), content)?;
    }

    print_json(&serde_json::json!({
        "runId": args.run_id,
        "outDir": out_dir.as_str(),
        "fileCount": files.len(),
    }))
}
