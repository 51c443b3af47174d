//! Tick orchestrator: advances one run by up to `max_jobs` queued jobs under
//! an advisory lock, then recomputes and persists the run's status.
//!
//! Modeled on a `TickHandle`/`PhaseOrchestrator` split — a single entry point
//! ([`process_tick`]) owns the advisory lock for the duration of one tick and
//! releases it on every exit path, mirroring a file-lock-guarded orchestrator
//! generalized to a DB session lock.

use chrono::Utc;

use daybook_bundle::{build_bundle, render_atom_line, BundleInput};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{Job, JobError, JobStatus, Run, RunStatus};
use daybook_db::advisory_lock::TickLock;
use daybook_db::repo::{AtomRepo, JobRepo, OutputRepo, PromptRepo, RunRepo};
use daybook_db::Database;
use daybook_llm::{BudgetPolicy, LlmBackend, LlmClient, SpendSoFar};
use daybook_segment::{estimate_tokens, segment_bundle, SegmentInputAtom};
use daybook_summarize::{summarize, SummarizeInput};

#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub run_id: String,
    pub run_status: RunStatus,
    pub jobs_processed: usize,
}

/// Runs one tick of `run_id`: claims up to `max_jobs` queued jobs (lowest
/// `day_date` first) and processes them sequentially. `backend` must already
/// be the one matching the run's model (stub vs. a real provider adapter) —
/// that decision is the caller's, made once per run, not per tick.
///
/// Returns `TickInProgressError` if another tick already holds the run's
/// advisory lock; this is an expected, retriable outcome under concurrent
/// scheduling, not a bug.
pub async fn process_tick(
    db: &Database,
    run_id: &str,
    max_jobs: usize,
    backend: Box<dyn LlmBackend>,
    min_delay_ms: u64,
) -> Result<TickOutcome> {
    RunRepo::get(&db.pool, run_id)
        .await?
        .ok_or_else(|| DaybookError::NotFound { resource: "run".to_string(), id: run_id.to_string() })?;

    let lock = TickLock::try_acquire(&db.lock_pool, run_id)
        .await?
        .ok_or_else(|| DaybookError::TickInProgress { run_id: run_id.to_string() })?;

    let result = run_tick_body(db, run_id, max_jobs, backend, min_delay_ms).await;

    lock.release().await?;
    result
}

async fn run_tick_body(
    db: &Database,
    run_id: &str,
    max_jobs: usize,
    backend: Box<dyn LlmBackend>,
    min_delay_ms: u64,
) -> Result<TickOutcome> {
    let run = RunRepo::get(&db.pool, run_id)
        .await?
        .ok_or_else(|| DaybookError::NotFound { resource: "run".to_string(), id: run_id.to_string() })?;

    if run.status == RunStatus::Cancelled {
        return Ok(TickOutcome { run_id: run_id.to_string(), run_status: RunStatus::Cancelled, jobs_processed: 0 });
    }

    let batch_ids = RunRepo::batch_ids_for_run(&db.pool, run_id).await?;

    let claimed = claim_jobs(db, run_id, max_jobs).await?;

    if claimed.is_empty() {
        let status = recompute_and_persist(db, run_id).await?;
        tracing::debug!(run_id, ?status, "tick found nothing queued");
        return Ok(TickOutcome { run_id: run_id.to_string(), run_status: status, jobs_processed: 0 });
    }

    RunRepo::update_status(&db.pool, run_id, RunStatus::Running).await?;

    let client = LlmClient::new(backend, min_delay_ms);
    let prompt_version =
        PromptRepo::get_version(&db.pool, &run.config.summarize_prompt_version_id)
            .await?
            .ok_or_else(|| DaybookError::NotFound {
                resource: "prompt_version".to_string(),
                id: run.config.summarize_prompt_version_id.clone(),
            })?;

    let filter_categories: Vec<String> =
        run.config.filter_profile.categories.iter().map(|c| c.as_str().to_string()).collect();
    let label_spec_json = serde_json::to_value(&run.config.label_spec)
        .map_err(|e| DaybookError::Database(e.to_string()))?;

    for job in &claimed {
        process_job(
            db,
            &run,
            job,
            &batch_ids,
            &filter_categories,
            &label_spec_json,
            &prompt_version.template_text,
            &client,
        )
        .await?;
    }

    let status = recompute_and_persist(db, run_id).await?;
    tracing::info!(run_id, jobs_processed = claimed.len(), ?status, "tick finished");
    Ok(TickOutcome { run_id: run_id.to_string(), run_status: status, jobs_processed: claimed.len() })
}

/// Claims up to `max_jobs` queued jobs one at a time via
/// `JobRepo::claim_next_queued`, which atomically marks each `running` under
/// `FOR UPDATE SKIP LOCKED` so a concurrent tick (on a different run, or
/// racing before this tick's advisory lock landed) never double-claims.
async fn claim_jobs(db: &Database, run_id: &str, max_jobs: usize) -> Result<Vec<Job>> {
    let mut conn = db.pool.acquire().await.map_err(|e| DaybookError::Database(e.to_string()))?;
    let mut claimed = Vec::new();
    for _ in 0..max_jobs {
        match JobRepo::claim_next_queued(&mut conn, run_id).await? {
            Some(job) => claimed.push(job),
            None => break,
        }
    }
    Ok(claimed)
}

#[allow(clippy::too_many_arguments)]
async fn process_job(
    db: &Database,
    run: &Run,
    job: &Job,
    batch_ids: &[String],
    filter_categories: &[String],
    label_spec_json: &serde_json::Value,
    template_text: &str,
    client: &LlmClient,
) -> Result<()> {
    let atoms = match AtomRepo::load_bundle_atoms(
        &db.pool,
        batch_ids,
        &job.day_date,
        &run.config.sources,
        &run.config.label_spec.model,
        &run.config.label_spec.prompt_version_id,
        run.config.filter_profile.mode,
        filter_categories,
    )
    .await
    {
        Ok(atoms) => atoms,
        Err(e) => {
            fail_job(db, &job.id, &e, None, None, None).await?;
            return Ok(());
        }
    };

    let bundle_input = BundleInput {
        batch_ids,
        day_date: &job.day_date,
        sources: &run.config.sources,
        filter_profile: &run.config.filter_profile,
        label_spec_json,
    };
    let bundle = build_bundle(&bundle_input, atoms);

    if bundle.atoms.is_empty() {
        JobRepo::mark_succeeded(&db.pool, &job.id, 0, 0, 0.0).await?;
        return Ok(());
    }

    let segment_atoms: Vec<SegmentInputAtom> = bundle
        .atoms
        .iter()
        .map(|a| SegmentInputAtom {
            atom_stable_id: a.atom_stable_id.clone(),
            source: a.source.clone(),
            rendered_line: render_atom_line(a),
        })
        .collect();
    let segmentation =
        segment_bundle(&segment_atoms, &bundle.bundle_hash, run.config.max_input_tokens);

    let policy =
        BudgetPolicy { max_usd_per_run: run.config.max_usd_per_run, max_usd_per_day: run.config.max_usd_per_day };

    let mut tokens_in_total: i64 = 0;
    let mut tokens_out_total: i64 = 0;
    let mut cost_total = 0.0f64;
    let mut segment_texts: Vec<(usize, String)> = Vec::new();

    for segment in &segmentation.segments {
        let run_spent = OutputRepo::spent_usd_for_run(&db.pool, &run.id).await? + cost_total;
        let day_spent = OutputRepo::spent_usd_today(&db.pool).await? + cost_total;
        let spend = SpendSoFar { run_spent_usd: run_spent, day_spent_usd: day_spent };

        let input = SummarizeInput {
            bundle_text: &segment.text,
            model: &run.config.pricing_snapshot.model,
            template_text,
        };

        match summarize(client, &input, &run.config.pricing_snapshot, &policy, &spend).await {
            Ok((result, cost)) => {
                tokens_in_total += i64::from(result.tokens_in);
                tokens_out_total += i64::from(result.tokens_out);
                cost_total += cost;
                segment_texts.push((segment.index, result.text));
            }
            Err(e) => {
                let partial_tokens_in = i32::try_from(tokens_in_total).unwrap_or(i32::MAX);
                let partial_tokens_out = i32::try_from(tokens_out_total).unwrap_or(i32::MAX);
                fail_job(db, &job.id, &e, Some(partial_tokens_in), Some(partial_tokens_out), Some(cost_total))
                    .await?;
                return Ok(());
            }
        }
    }

    let output_text = if segment_texts.len() <= 1 {
        segment_texts.into_iter().map(|(_, text)| text).collect::<Vec<_>>().join("")
    } else {
        segment_texts
            .into_iter()
            .map(|(index, text)| format!("## Segment {}\n\n{text}", index + 1))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let estimated_input_tokens = i32::try_from(estimate_tokens(&bundle.bundle_text)).unwrap_or(i32::MAX);
    let segment_ids: Vec<String> = segmentation.segments.iter().map(|s| s.id.clone()).collect();
    let tokens_in = i32::try_from(tokens_in_total).unwrap_or(i32::MAX);
    let tokens_out = i32::try_from(tokens_out_total).unwrap_or(i32::MAX);

    OutputRepo::upsert_summarize(
        &db.pool,
        &daybook_db::repo::output::NewOutput {
            job_id: &job.id,
            output_text: &output_text,
            bundle_hash: &bundle.bundle_hash,
            bundle_context_hash: &bundle.bundle_context_hash,
            segmented: segmentation.was_segmented,
            segment_count: i32::try_from(segmentation.segments.len()).unwrap_or(i32::MAX),
            segment_ids: &segment_ids,
            atom_count: i32::try_from(bundle.atoms.len()).unwrap_or(i32::MAX),
            estimated_input_tokens,
            tokens_in,
            tokens_out,
            cost_usd: cost_total,
        },
    )
    .await?;

    JobRepo::mark_succeeded(&db.pool, &job.id, tokens_in, tokens_out, cost_total).await?;
    Ok(())
}

async fn fail_job(
    db: &Database,
    job_id: &str,
    error: &DaybookError,
    partial_tokens_in: Option<i32>,
    partial_tokens_out: Option<i32>,
    partial_cost_usd: Option<f64>,
) -> Result<()> {
    let job_error = JobError {
        code: error.code().to_string(),
        message: error.to_string(),
        retriable: error.retriable(),
        at: Utc::now(),
    };
    tracing::warn!(job_id, code = job_error.code, retriable = job_error.retriable, "job failed");
    JobRepo::mark_failed(&db.pool, job_id, &job_error, partial_tokens_in, partial_tokens_out, partial_cost_usd)
        .await
}

async fn recompute_and_persist(db: &Database, run_id: &str) -> Result<RunStatus> {
    let jobs = JobRepo::list_by_run(&db.pool, run_id).await?;
    let statuses: Vec<JobStatus> = jobs.iter().map(|j| j.status).collect();
    let status = compute_status(&statuses);
    RunRepo::update_status(&db.pool, run_id, status).await?;
    Ok(status)
}

/// Pure recomputation of a run's status from its jobs' current statuses, per
/// the transition table: `running` while any job is running or any work has
/// happened and a job remains queued; `completed`/`failed` once every job is
/// terminal; `queued` as a defensive fallback when nothing has happened yet
/// (including the all-cancelled case, since a cancelled run never reaches
/// this function in the first place — `process_tick` short-circuits on it).
#[must_use]
fn compute_status(statuses: &[JobStatus]) -> RunStatus {
    if statuses.is_empty() {
        return RunStatus::Queued;
    }

    let running = statuses.iter().filter(|s| **s == JobStatus::Running).count();
    let queued = statuses.iter().filter(|s| **s == JobStatus::Queued).count();
    let succeeded = statuses.iter().filter(|s| **s == JobStatus::Succeeded).count();
    let failed = statuses.iter().filter(|s| **s == JobStatus::Failed).count();

    if succeeded == 0 && failed == 0 && running == 0 {
        return RunStatus::Queued;
    }
    if running > 0 || queued > 0 {
        return RunStatus::Running;
    }
    if failed > 0 {
        RunStatus::Failed
    } else {
        RunStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_queued_is_queued() {
        assert_eq!(compute_status(&[JobStatus::Queued, JobStatus::Queued]), RunStatus::Queued);
    }

    #[test]
    fn all_cancelled_falls_back_to_queued() {
        assert_eq!(compute_status(&[JobStatus::Cancelled, JobStatus::Cancelled]), RunStatus::Queued);
    }

    #[test]
    fn scenario_s6_one_succeeded_one_queued_is_running() {
        assert_eq!(compute_status(&[JobStatus::Succeeded, JobStatus::Queued]), RunStatus::Running);
    }

    #[test]
    fn any_running_job_is_running() {
        assert_eq!(compute_status(&[JobStatus::Running, JobStatus::Succeeded]), RunStatus::Running);
    }

    #[test]
    fn all_succeeded_is_completed() {
        assert_eq!(compute_status(&[JobStatus::Succeeded, JobStatus::Succeeded]), RunStatus::Completed);
    }

    #[test]
    fn any_failed_with_all_terminal_is_failed() {
        assert_eq!(compute_status(&[JobStatus::Succeeded, JobStatus::Failed]), RunStatus::Failed);
    }

    #[test]
    fn terminal_mix_with_cancelled_and_no_failure_is_completed() {
        assert_eq!(compute_status(&[JobStatus::Succeeded, JobStatus::Cancelled]), RunStatus::Completed);
    }

    #[test]
    fn empty_job_list_is_queued() {
        assert_eq!(compute_status(&[]), RunStatus::Queued);
    }
}
