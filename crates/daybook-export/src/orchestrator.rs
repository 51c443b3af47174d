//! Loads a run's rows out of `daybook-db`, checks the export preconditions,
//! and assembles an [`ExportInput`] for [`crate::render::render_export`].
//!
//! Grounded on `daybook-tick`'s orchestration shape — a thin async function
//! sequencing repo calls against a shared `&db.pool`, with no transaction of
//! its own since export is read-only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{JobStatus, MessageAtom, Role, RunStatus};
use daybook_db::repo::{AtomRepo, ImportBatchRepo, JobRepo, OutputRepo, RunRepo};
use daybook_db::Database;

use crate::render::render_export;
use crate::types::{
    ExportAtom, ExportBatchInput, ExportDayInput, ExportInput, FormatVersion, PreviousManifestInput, PrivacyTier,
};

/// What the caller wants out of this export: which tier, and whether to turn
/// on `topic_v1` (V2). `previous_manifest` feeds the changelog diff; `None`
/// means no changelog is rendered.
pub struct ExportOptions {
    pub privacy_tier: PrivacyTier,
    pub topic_version: Option<String>,
    pub previous_manifest: Option<PreviousManifestInput>,
}

/// Loads everything `render_export` needs for `run_id` and renders the tree
/// in one call. Returns `ExportPrecondition`/`ExportNotFound` per §14.7 when
/// the run isn't ready to export.
pub async fn export_run(
    db: &Database,
    run_id: &str,
    options: ExportOptions,
    exported_at: DateTime<Utc>,
) -> Result<BTreeMap<String, String>> {
    let input = build_export_input(db, run_id, options, exported_at).await?;
    render_export(&input)
}

/// Same as [`export_run`] but stops short of rendering, returning the
/// assembled [`ExportInput`] — useful for callers that want to inspect or
/// cache the input before paying the rendering cost.
pub async fn build_export_input(
    db: &Database,
    run_id: &str,
    options: ExportOptions,
    exported_at: DateTime<Utc>,
) -> Result<ExportInput> {
    let run = RunRepo::get(&db.pool, run_id)
        .await?
        .ok_or_else(|| DaybookError::ExportNotFound { run_id: run_id.to_string() })?;

    if run.status != RunStatus::Completed {
        return Err(DaybookError::ExportPrecondition {
            run_id: run_id.to_string(),
            reason: format!("run status is {:?}, not completed", run.status),
        });
    }

    let jobs = JobRepo::list_by_run(&db.pool, run_id).await?;

    let format_version = match options.topic_version {
        Some(topic_version) => FormatVersion::V2 { topic_version },
        None => FormatVersion::V1,
    };
    let need_atoms = options.privacy_tier == PrivacyTier::Private || format_version.is_v2();

    let batch_ids = RunRepo::batch_ids_for_run(&db.pool, run_id).await?;

    let mut days = Vec::with_capacity(jobs.len());
    for job in &jobs {
        if job.status != JobStatus::Succeeded {
            return Err(DaybookError::ExportPrecondition {
                run_id: run_id.to_string(),
                reason: format!("job for day {} is {:?}, not succeeded", job.day_date, job.status),
            });
        }

        let output = OutputRepo::get_for_job(&db.pool, &job.id).await?.ok_or_else(|| {
            DaybookError::ExportPrecondition {
                run_id: run_id.to_string(),
                reason: format!("job for day {} has no summarize output", job.day_date),
            }
        })?;

        let raw_atoms = if need_atoms {
            Some(load_export_atoms(db, &run, &batch_ids, &job.day_date, format_version.is_v2()).await?)
        } else {
            None
        };

        days.push(ExportDayInput {
            day_date: job.day_date.clone(),
            model: run.config.pricing_snapshot.model.clone(),
            run_id: run_id.to_string(),
            created_at: output.created_at,
            bundle_hash: output.bundle_hash,
            bundle_context_hash: output.bundle_context_hash,
            output_text: output.output_text,
            segmented: output.segmented,
            segment_count: output.segment_count,
            raw_atoms,
        });
    }
    days.sort_by(|a, b| a.day_date.cmp(&b.day_date));

    let mut batch_rows = ImportBatchRepo::list_by_ids(&db.pool, &batch_ids).await?;
    batch_rows.sort_by(|a, b| a.id.cmp(&b.id));
    let batches: Vec<ExportBatchInput> = batch_rows
        .into_iter()
        .map(|b| ExportBatchInput {
            import_batch_id: b.id,
            source: b.source,
            filename: b.filename,
            timezone: b.timezone,
            file_size_bytes: b.file_size_bytes,
            message_count: b.message_count,
            unique_day_count: b.unique_day_count,
            first_day_date: b.first_day_date,
            last_day_date: b.last_day_date,
        })
        .collect();

    Ok(ExportInput {
        format_version,
        privacy_tier: options.privacy_tier,
        run_id: run_id.to_string(),
        start_date: run.start_date,
        end_date: run.end_date,
        exported_at,
        days,
        batches,
        previous_manifest: options.previous_manifest,
    })
}

/// Loads one day's atoms (every role, per `AtomRepo::load_day_atoms`'s
/// contract) and keeps the user-role ones — the only ones the export tree
/// ever renders, per §4.J's `atoms/YYYY-MM-DD.md` and topic computation.
/// Categories are resolved one atom at a time via `category_for_atom`, only
/// when V2 needs them.
async fn load_export_atoms(
    db: &Database,
    run: &daybook_core::model::Run,
    batch_ids: &[String],
    day_date: &str,
    resolve_categories: bool,
) -> Result<Vec<ExportAtom>> {
    let atoms: Vec<MessageAtom> = AtomRepo::load_day_atoms(&db.pool, batch_ids, day_date)
        .await?
        .into_iter()
        .filter(|a| a.role.0 == Role::User)
        .collect();

    let mut export_atoms = Vec::with_capacity(atoms.len());
    for atom in atoms {
        let category = if resolve_categories {
            AtomRepo::category_for_atom(
                &db.pool,
                &atom.atom_stable_id,
                &run.config.label_spec.model,
                &run.config.label_spec.prompt_version_id,
            )
            .await?
        } else {
            None
        };
        export_atoms.push(ExportAtom { atom, category });
    }
    Ok(export_atoms)
}
