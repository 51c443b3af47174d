use chrono::{DateTime, Utc};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::ClassifyRun;
use sqlx::{PgExecutor, Row};

pub struct NewClassifyRun<'a> {
    pub import_batch_id: &'a str,
    pub model: &'a str,
    pub prompt_version_id: &'a str,
    pub newly_labeled: i64,
    pub already_labeled: i64,
}

pub struct ClassifyRunRepo;

impl ClassifyRunRepo {
    pub async fn create<'e, E>(executor: E, stats: &NewClassifyRun<'_>) -> Result<ClassifyRun>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "INSERT INTO classify_runs
                (import_batch_id, model, prompt_version_id, newly_labeled, already_labeled)
             VALUES ($1::uuid, $2, $3::uuid, $4, $5)
             RETURNING id::text, import_batch_id::text, model, prompt_version_id::text,
                       newly_labeled, already_labeled, created_at",
        )
        .bind(stats.import_batch_id)
        .bind(stats.model)
        .bind(stats.prompt_version_id)
        .bind(stats.newly_labeled)
        .bind(stats.already_labeled)
        .fetch_one(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        Ok(ClassifyRun {
            id: row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?,
            import_batch_id: row
                .try_get("import_batch_id")
                .map_err(|e| DaybookError::Database(e.to_string()))?,
            model: row.try_get("model").map_err(|e| DaybookError::Database(e.to_string()))?,
            prompt_version_id: row
                .try_get("prompt_version_id")
                .map_err(|e| DaybookError::Database(e.to_string()))?,
            newly_labeled: row
                .try_get("newly_labeled")
                .map_err(|e| DaybookError::Database(e.to_string()))?,
            already_labeled: row
                .try_get("already_labeled")
                .map_err(|e| DaybookError::Database(e.to_string()))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| DaybookError::Database(e.to_string()))?,
        })
    }

    pub async fn count_labeled<'e, E>(
        executor: E,
        import_batch_id: &str,
        model: &str,
        prompt_version_id: &str,
    ) -> Result<i64>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM message_labels l
             JOIN message_atoms a ON a.atom_stable_id = l.atom_stable_id
             WHERE a.import_batch_id = $1::uuid AND l.model = $2 AND l.prompt_version_id = $3::uuid",
        )
        .bind(import_batch_id)
        .bind(model)
        .bind(prompt_version_id)
        .fetch_one(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.try_get("n").map_err(|e| DaybookError::Database(e.to_string()))
    }

    pub async fn total_atoms<'e, E>(executor: E, import_batch_id: &str) -> Result<i64>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM message_atoms WHERE import_batch_id = $1::uuid")
            .bind(import_batch_id)
            .fetch_one(executor)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.try_get("n").map_err(|e| DaybookError::Database(e.to_string()))
    }
}

pub struct LabelRepo;

pub struct NewLabel<'a> {
    pub atom_stable_id: &'a str,
    pub model: &'a str,
    pub prompt_version_id: &'a str,
    pub category: &'a str,
    pub confidence: f64,
}

impl LabelRepo {
    /// Inserts a label, duplicate-safe on `(atom, model, prompt_version_id)`
    /// — a label, once written, is immutable, so a conflicting insert is a
    /// silent no-op rather than an overwrite.
    pub async fn insert<'e, E>(executor: E, label: &NewLabel<'_>) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "INSERT INTO message_labels (atom_stable_id, model, prompt_version_id, category, confidence)
             VALUES ($1, $2, $3::uuid, $4, $5)
             ON CONFLICT (atom_stable_id, model, prompt_version_id) DO NOTHING",
        )
        .bind(label.atom_stable_id)
        .bind(label.model)
        .bind(label.prompt_version_id)
        .bind(label.category)
        .bind(label.confidence)
        .execute(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
