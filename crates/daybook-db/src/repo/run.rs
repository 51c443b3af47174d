use chrono::{DateTime, Utc};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{Run, RunConfig, RunStatus};
use sqlx::{PgExecutor, Row};

pub struct NewRun<'a> {
    pub start_date: &'a str,
    pub end_date: &'a str,
    pub timezone: &'a str,
    pub config: &'a RunConfig,
}

pub struct RunRepo;

impl RunRepo {
    pub async fn create<'e, E>(executor: E, new_run: &NewRun<'_>) -> Result<Run>
    where
        E: PgExecutor<'e>,
    {
        let config_json = serde_json::to_value(new_run.config)
            .map_err(|e| DaybookError::Database(e.to_string()))?;

        let row = sqlx::query(
            "INSERT INTO runs (start_date, end_date, timezone, status, config)
             VALUES ($1::date, $2::date, $3, 'queued', $4)
             RETURNING id::text, start_date::text, end_date::text, timezone, status, config, created_at",
        )
        .bind(new_run.start_date)
        .bind(new_run.end_date)
        .bind(new_run.timezone)
        .bind(config_json)
        .fetch_one(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row_to_run(&row)
    }

    pub async fn get<'e, E>(executor: E, id: &str) -> Result<Option<Run>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT id::text, start_date::text, end_date::text, timezone, status, config, created_at
             FROM runs WHERE id = $1::uuid",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.as_ref().map(row_to_run).transpose()
    }

    pub async fn update_status<'e, E>(executor: E, id: &str, status: RunStatus) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE runs SET status = $1 WHERE id = $2::uuid")
            .bind(status_str(status))
            .bind(id)
            .execute(executor)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn link_batch<'e, E>(executor: E, run_id: &str, import_batch_id: &str) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("INSERT INTO run_batches (run_id, import_batch_id) VALUES ($1::uuid, $2::uuid)")
            .bind(run_id)
            .bind(import_batch_id)
            .execute(executor)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn batch_ids_for_run<'e, E>(executor: E, run_id: &str) -> Result<Vec<String>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query("SELECT import_batch_id::text FROM run_batches WHERE run_id = $1::uuid")
            .bind(run_id)
            .fetch_all(executor)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;

        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("import_batch_id")
                    .map_err(|e| DaybookError::Database(e.to_string()))
            })
            .collect()
    }
}

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Queued => "queued",
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
    }
}

fn row_to_run(row: &sqlx::postgres::PgRow) -> Result<Run> {
    let status_s: String = row.try_get("status").map_err(|e| DaybookError::Database(e.to_string()))?;
    let status = match status_s.as_str() {
        "running" => RunStatus::Running,
        "completed" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        "cancelled" => RunStatus::Cancelled,
        _ => RunStatus::Queued,
    };
    let config_json: serde_json::Value =
        row.try_get("config").map_err(|e| DaybookError::Database(e.to_string()))?;
    let config: RunConfig =
        serde_json::from_value(config_json).map_err(|e| DaybookError::Database(e.to_string()))?;

    Ok(Run {
        id: row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?,
        start_date: row.try_get("start_date").map_err(|e| DaybookError::Database(e.to_string()))?,
        end_date: row.try_get("end_date").map_err(|e| DaybookError::Database(e.to_string()))?,
        timezone: row.try_get("timezone").map_err(|e| DaybookError::Database(e.to_string()))?,
        status,
        config,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
    })
}
