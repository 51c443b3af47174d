use chrono::{DateTime, Utc};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{Job, JobError, JobStatus};
use sqlx::{PgExecutor, Row};

pub struct JobRepo;

impl JobRepo {
    pub async fn create<'e, E>(executor: E, run_id: &str, day_date: &str) -> Result<Job>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "INSERT INTO jobs (run_id, day_date, status, attempt)
             VALUES ($1::uuid, $2::date, 'queued', 1)
             RETURNING id::text, run_id::text, day_date::text, status, attempt, started_at,
                       last_error, tokens_in, tokens_out, cost_usd",
        )
        .bind(run_id)
        .bind(day_date)
        .fetch_one(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row_to_job(&row)
    }

    pub async fn list_by_run<'e, E>(executor: E, run_id: &str) -> Result<Vec<Job>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query(
            "SELECT id::text, run_id::text, day_date::text, status, attempt, started_at,
                    last_error, tokens_in, tokens_out, cost_usd
             FROM jobs WHERE run_id = $1::uuid ORDER BY day_date ASC",
        )
        .bind(run_id)
        .fetch_all(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        rows.iter().map(row_to_job).collect()
    }

    pub async fn get<'e, E>(executor: E, job_id: &str) -> Result<Option<Job>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT id::text, run_id::text, day_date::text, status, attempt, started_at,
                    last_error, tokens_in, tokens_out, cost_usd
             FROM jobs WHERE id = $1::uuid",
        )
        .bind(job_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.as_ref().map(row_to_job).transpose()
    }

    /// Claims the next queued job for `run_id` (lowest day_date first),
    /// atomically marking it running and stamping `started_at`. Returns
    /// `None` when nothing is queued. Must run against the same
    /// transaction/connection the tick uses for the rest of its work so a
    /// crash mid-tick doesn't strand a job permanently `running`.
    pub async fn claim_next_queued(
        conn: &mut sqlx::PgConnection,
        run_id: &str,
    ) -> Result<Option<Job>> {
        let row = sqlx::query(
            "UPDATE jobs SET status = 'running', started_at = now()
             WHERE id = (
                 SELECT id FROM jobs
                 WHERE run_id = $1::uuid AND status = 'queued'
                 ORDER BY day_date ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id::text, run_id::text, day_date::text, status, attempt, started_at,
                       last_error, tokens_in, tokens_out, cost_usd",
        )
        .bind(run_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.as_ref().map(row_to_job).transpose()
    }

    /// Marks a job succeeded, persisting the spend its one summarize output
    /// incurred so it's visible on the job row without a join even though
    /// the authoritative copy lives on the `Output` row.
    pub async fn mark_succeeded<'e, E>(
        executor: E,
        job_id: &str,
        tokens_in: i32,
        tokens_out: i32,
        cost_usd: f64,
    ) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE jobs SET status = 'succeeded', last_error = NULL,
                    tokens_in = $2, tokens_out = $3, cost_usd = $4
             WHERE id = $1::uuid",
        )
        .bind(job_id)
        .bind(tokens_in)
        .bind(tokens_out)
        .bind(cost_usd)
        .execute(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;
        Ok(())
    }

    /// Marks a job failed. `partial_tokens_in`/`partial_tokens_out`/
    /// `partial_cost_usd` capture whatever the job's LLM calls spent before
    /// the failing segment, if any — `None` when the job failed before any
    /// call was made (e.g. bundle building itself errored).
    pub async fn mark_failed<'e, E>(
        executor: E,
        job_id: &str,
        error: &JobError,
        partial_tokens_in: Option<i32>,
        partial_tokens_out: Option<i32>,
        partial_cost_usd: Option<f64>,
    ) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        let error_json =
            serde_json::to_value(error).map_err(|e| DaybookError::Database(e.to_string()))?;
        sqlx::query(
            "UPDATE jobs SET status = 'failed', attempt = attempt + 1, last_error = $2,
                    tokens_in = $3, tokens_out = $4, cost_usd = $5
             WHERE id = $1::uuid",
        )
        .bind(job_id)
        .bind(error_json)
        .bind(partial_tokens_in)
        .bind(partial_tokens_out)
        .bind(partial_cost_usd)
        .execute(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn cancel_queued_for_run<'e, E>(executor: E, run_id: &str) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE jobs SET status = 'cancelled' WHERE run_id = $1::uuid AND status = 'queued'")
            .bind(run_id)
            .execute(executor)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;
        Ok(())
    }
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> Result<Job> {
    let status_s: String = row.try_get("status").map_err(|e| DaybookError::Database(e.to_string()))?;
    let status = match status_s.as_str() {
        "running" => JobStatus::Running,
        "succeeded" => JobStatus::Succeeded,
        "failed" => JobStatus::Failed,
        "cancelled" => JobStatus::Cancelled,
        _ => JobStatus::Queued,
    };

    let last_error_json: Option<serde_json::Value> =
        row.try_get("last_error").map_err(|e| DaybookError::Database(e.to_string()))?;
    let last_error = last_error_json
        .map(serde_json::from_value::<JobError>)
        .transpose()
        .map_err(|e| DaybookError::Database(e.to_string()))?;

    Ok(Job {
        id: row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?,
        run_id: row.try_get("run_id").map_err(|e| DaybookError::Database(e.to_string()))?,
        day_date: row.try_get("day_date").map_err(|e| DaybookError::Database(e.to_string()))?,
        status,
        attempt: row.try_get("attempt").map_err(|e| DaybookError::Database(e.to_string()))?,
        started_at: row
            .try_get::<Option<DateTime<Utc>>, _>("started_at")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        last_error,
        tokens_in: row
            .try_get::<Option<i32>, _>("tokens_in")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        tokens_out: row
            .try_get::<Option<i32>, _>("tokens_out")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        cost_usd: row
            .try_get::<Option<f64>, _>("cost_usd")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
    })
}
