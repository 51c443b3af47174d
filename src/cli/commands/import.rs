//! `daybook import` — ingests a parser collaborator's already-normalised
//! message stream (see §6 of the spec this pipeline implements: vendor
//! format parsing itself is an external collaborator, out of scope here).
//!
//! The input file is the JSON array a parser hands the core: one object per
//! message with `source`, optional `sourceConversationId`/`sourceMessageId`,
//! `timestampUtc`, `role`, `text`.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use daybook_db::Database;
use daybook_hash::Role;
use daybook_ingest::{import_export, ImportRequest, ParsedMessage};
use serde::{Deserialize, Serialize};

use super::print_json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedMessageInput {
    source: String,
    source_conversation_id: Option<String>,
    source_message_id: Option<String>,
    timestamp_utc: DateTime<Utc>,
    role: String,
    text: String,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Path to a JSON file containing an array of normalised messages.
    #[arg(long)]
    input: PathBuf,

    /// IANA timezone the batch's dayDate boundaries are computed in.
    #[arg(long)]
    timezone: String,

    /// Overrides the filename recorded on the ImportBatch; defaults to
    /// `--input`'s file name.
    #[arg(long)]
    filename: Option<String>,

    /// The batch's source vendor (chatgpt|claude|grok); an ImportBatch has
    /// exactly one source, so this is required rather than inferred
    /// per-message.
    #[arg(long)]
    source: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportReport {
    import_batch_id: String,
    inserted_atom_count: u64,
    skipped_duplicate_count: u64,
}

pub async fn run(db: &Database, args: ImportArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let file_size_bytes = raw.len() as i64;
    let parsed: Vec<ParsedMessageInput> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {} as a message array", args.input.display()))?;

    let filename = args
        .filename
        .clone()
        .or_else(|| args.input.file_name().map(|f| f.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "import.json".to_string());

    let messages = parsed
        .into_iter()
        .map(|m| {
            let role = Role::from_str(&m.role).map_err(|_| anyhow::anyhow!("unknown role {:?}", m.role))?;
            let _ = &m.source; // the batch's source is fixed by --source, not per-message
            Ok(ParsedMessage {
                source: args.source.clone(),
                source_conversation_id: m.source_conversation_id,
                source_message_id: m.source_message_id,
                timestamp_utc: m.timestamp_utc,
                role,
                text: m.text,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let outcome = import_export(
        db,
        ImportRequest {
            filename,
            file_size_bytes,
            timezone: args.timezone,
            source_override: Some(args.source),
            messages,
        },
    )
    .await?;

    print_json(&ImportReport {
        import_batch_id: outcome.import_batch_id,
        inserted_atom_count: outcome.inserted_atom_count,
        skipped_duplicate_count: outcome.skipped_duplicate_count,
    })
}
