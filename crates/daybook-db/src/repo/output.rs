use chrono::{DateTime, Utc};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{Output, OutputKind};
use sqlx::{PgExecutor, Row};

pub struct NewOutput<'a> {
    pub job_id: &'a str,
    pub output_text: &'a str,
    pub bundle_hash: &'a str,
    pub bundle_context_hash: &'a str,
    pub segmented: bool,
    pub segment_count: i32,
    pub segment_ids: &'a [String],
    pub atom_count: i32,
    pub estimated_input_tokens: i32,
    pub tokens_in: i32,
    pub tokens_out: i32,
    pub cost_usd: f64,
}

pub struct OutputRepo;

impl OutputRepo {
    /// Summarize is idempotent per job: re-running a succeeded job's tick
    /// (which shouldn't happen, but defensively) replaces its one output
    /// rather than accumulating duplicates.
    pub async fn upsert_summarize<'e, E>(executor: E, output: &NewOutput<'_>) -> Result<Output>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "INSERT INTO outputs
                (job_id, kind, output_text, bundle_hash, bundle_context_hash, segmented,
                 segment_count, segment_ids, atom_count, estimated_input_tokens,
                 tokens_in, tokens_out, cost_usd)
             VALUES ($1::uuid, 'summarize', $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (job_id, kind) DO UPDATE SET
                output_text = EXCLUDED.output_text,
                bundle_hash = EXCLUDED.bundle_hash,
                bundle_context_hash = EXCLUDED.bundle_context_hash,
                segmented = EXCLUDED.segmented,
                segment_count = EXCLUDED.segment_count,
                segment_ids = EXCLUDED.segment_ids,
                atom_count = EXCLUDED.atom_count,
                estimated_input_tokens = EXCLUDED.estimated_input_tokens,
                tokens_in = EXCLUDED.tokens_in,
                tokens_out = EXCLUDED.tokens_out,
                cost_usd = EXCLUDED.cost_usd
             RETURNING id::text, job_id::text, kind, output_text, bundle_hash, bundle_context_hash,
                       segmented, segment_count, segment_ids, atom_count, estimated_input_tokens,
                       tokens_in, tokens_out, cost_usd, created_at",
        )
        .bind(output.job_id)
        .bind(output.output_text)
        .bind(output.bundle_hash)
        .bind(output.bundle_context_hash)
        .bind(output.segmented)
        .bind(output.segment_count)
        .bind(output.segment_ids)
        .bind(output.atom_count)
        .bind(output.estimated_input_tokens)
        .bind(output.tokens_in)
        .bind(output.tokens_out)
        .bind(output.cost_usd)
        .fetch_one(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row_to_output(&row)
    }

    pub async fn get_for_job<'e, E>(executor: E, job_id: &str) -> Result<Option<Output>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT id::text, job_id::text, kind, output_text, bundle_hash, bundle_context_hash,
                    segmented, segment_count, segment_ids, atom_count, estimated_input_tokens,
                    tokens_in, tokens_out, cost_usd, created_at
             FROM outputs WHERE job_id = $1::uuid AND kind = 'summarize'",
        )
        .bind(job_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.as_ref().map(row_to_output).transpose()
    }

    /// Total spend across every output belonging to jobs of `run_id`, used
    /// by the budget guard's `maxUsdPerRun` check.
    pub async fn spent_usd_for_run<'e, E>(executor: E, run_id: &str) -> Result<f64>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(o.cost_usd), 0) AS total
             FROM outputs o JOIN jobs j ON j.id = o.job_id
             WHERE j.run_id = $1::uuid",
        )
        .bind(run_id)
        .fetch_one(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.try_get("total").map_err(|e| DaybookError::Database(e.to_string()))
    }

    /// Total spend across every output created today (UTC calendar day),
    /// used by the budget guard's `maxUsdPerDay` check.
    pub async fn spent_usd_today<'e, E>(executor: E) -> Result<f64>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(cost_usd), 0) AS total
             FROM outputs WHERE created_at::date = (now() at time zone 'utc')::date",
        )
        .fetch_one(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.try_get("total").map_err(|e| DaybookError::Database(e.to_string()))
    }
}

fn row_to_output(row: &sqlx::postgres::PgRow) -> Result<Output> {
    Ok(Output {
        id: row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?,
        job_id: row.try_get("job_id").map_err(|e| DaybookError::Database(e.to_string()))?,
        kind: OutputKind::Summarize,
        output_text: row.try_get("output_text").map_err(|e| DaybookError::Database(e.to_string()))?,
        bundle_hash: row.try_get("bundle_hash").map_err(|e| DaybookError::Database(e.to_string()))?,
        bundle_context_hash: row
            .try_get("bundle_context_hash")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        segmented: row.try_get("segmented").map_err(|e| DaybookError::Database(e.to_string()))?,
        segment_count: row
            .try_get("segment_count")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        segment_ids: row
            .try_get("segment_ids")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        atom_count: row.try_get("atom_count").map_err(|e| DaybookError::Database(e.to_string()))?,
        estimated_input_tokens: row
            .try_get("estimated_input_tokens")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        tokens_in: row.try_get("tokens_in").map_err(|e| DaybookError::Database(e.to_string()))?,
        tokens_out: row.try_get("tokens_out").map_err(|e| DaybookError::Database(e.to_string()))?,
        cost_usd: row.try_get("cost_usd").map_err(|e| DaybookError::Database(e.to_string()))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
    })
}
