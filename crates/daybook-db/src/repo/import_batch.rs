use chrono::{DateTime, Utc};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::ImportBatch;
use sqlx::{PgExecutor, Row};

pub struct NewImportBatch {
    pub source: String,
    pub timezone: String,
    pub filename: String,
    pub file_size_bytes: i64,
}

pub struct ImportBatchStats {
    pub message_count: i64,
    pub unique_day_count: i64,
    pub first_day_date: Option<String>,
    pub last_day_date: Option<String>,
}

pub struct ImportBatchRepo;

impl ImportBatchRepo {
    pub async fn create<'e, E>(
        executor: E,
        new_batch: &NewImportBatch,
        stats: &ImportBatchStats,
    ) -> Result<ImportBatch>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "INSERT INTO import_batches
                (source, timezone, filename, file_size_bytes, message_count,
                 unique_day_count, first_day_date, last_day_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7::date, $8::date)
             RETURNING id::text, source, timezone, filename, file_size_bytes,
                       message_count, unique_day_count,
                       first_day_date::text, last_day_date::text, created_at",
        )
        .bind(&new_batch.source)
        .bind(&new_batch.timezone)
        .bind(&new_batch.filename)
        .bind(new_batch.file_size_bytes)
        .bind(stats.message_count)
        .bind(stats.unique_day_count)
        .bind(&stats.first_day_date)
        .bind(&stats.last_day_date)
        .fetch_one(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        Ok(row_to_batch(&row)?)
    }

    pub async fn get<'e, E>(executor: E, id: &str) -> Result<Option<ImportBatch>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT id::text, source, timezone, filename, file_size_bytes,
                    message_count, unique_day_count,
                    first_day_date::text, last_day_date::text, created_at
             FROM import_batches WHERE id = $1::uuid",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.as_ref().map(row_to_batch).transpose()
    }

    pub async fn list_by_ids<'e, E>(executor: E, ids: &[String]) -> Result<Vec<ImportBatch>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query(
            "SELECT id::text, source, timezone, filename, file_size_bytes,
                    message_count, unique_day_count,
                    first_day_date::text, last_day_date::text, created_at
             FROM import_batches WHERE id = ANY($1::uuid[])",
        )
        .bind(ids)
        .fetch_all(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        rows.iter().map(row_to_batch).collect()
    }
}

fn row_to_batch(row: &sqlx::postgres::PgRow) -> Result<ImportBatch> {
    Ok(ImportBatch {
        id: row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?,
        source: row.try_get("source").map_err(|e| DaybookError::Database(e.to_string()))?,
        timezone: row.try_get("timezone").map_err(|e| DaybookError::Database(e.to_string()))?,
        filename: row.try_get("filename").map_err(|e| DaybookError::Database(e.to_string()))?,
        file_size_bytes: row
            .try_get("file_size_bytes")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        message_count: row
            .try_get("message_count")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        unique_day_count: row
            .try_get("unique_day_count")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        first_day_date: row
            .try_get("first_day_date")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        last_day_date: row
            .try_get("last_day_date")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
    })
}
