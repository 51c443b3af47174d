use daybook_core::error::{DaybookError, Result};
use sqlx::PgExecutor;

pub struct NewRawEntry<'a> {
    pub source: &'a str,
    pub day_date: &'a str,
    pub content_text: &'a str,
    pub content_hash: &'a str,
    pub import_batch_id: &'a str,
}

pub struct RawEntryRepo;

impl RawEntryRepo {
    /// Upserts a raw entry for `(source, day_date, import_batch_id)`; a
    /// re-import of the same batch (should it ever happen) replaces the
    /// joined text deterministically rather than duplicating it.
    pub async fn upsert<'e, E>(executor: E, entry: &NewRawEntry<'_>) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "INSERT INTO raw_entries (source, day_date, content_text, content_hash, import_batch_id)
             VALUES ($1, $2::date, $3, $4, $5::uuid)
             ON CONFLICT (source, day_date, import_batch_id)
             DO UPDATE SET content_text = EXCLUDED.content_text,
                           content_hash = EXCLUDED.content_hash",
        )
        .bind(entry.source)
        .bind(entry.day_date)
        .bind(entry.content_text)
        .bind(entry.content_hash)
        .bind(entry.import_batch_id)
        .execute(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        Ok(())
    }
}
