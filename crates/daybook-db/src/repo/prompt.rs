use chrono::{DateTime, Utc};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{PromptStage, PromptVersion};
use sqlx::{PgExecutor, Row};

pub struct PromptRepo;

impl PromptRepo {
    pub async fn get_version<'e, E>(executor: E, id: &str) -> Result<Option<PromptVersion>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT pv.id::text, pv.prompt_id::text, p.stage, pv.model, pv.template_text,
                    pv.is_active, pv.is_stub, pv.created_at
             FROM prompt_versions pv
             JOIN prompts p ON p.id = pv.prompt_id
             WHERE pv.id = $1::uuid",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.as_ref().map(row_to_version).transpose()
    }

    /// The single currently-active prompt version for `stage`. Errors if
    /// zero or more than one is active — an invariant the migration that
    /// seeds prompt data is responsible for maintaining.
    pub async fn active_version_for_stage<'e, E>(
        executor: E,
        stage: PromptStage,
    ) -> Result<Option<PromptVersion>>
    where
        E: PgExecutor<'e>,
    {
        let stage_str = match stage {
            PromptStage::Classify => "classify",
            PromptStage::Summarize => "summarize",
        };
        let row = sqlx::query(
            "SELECT pv.id::text, pv.prompt_id::text, p.stage, pv.model, pv.template_text,
                    pv.is_active, pv.is_stub, pv.created_at
             FROM prompt_versions pv
             JOIN prompts p ON p.id = pv.prompt_id
             WHERE p.stage = $1 AND pv.is_active = true
             ORDER BY pv.created_at DESC
             LIMIT 1",
        )
        .bind(stage_str)
        .fetch_optional(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.as_ref().map(row_to_version).transpose()
    }

    /// The most recently created active classify prompt version — used to
    /// resolve the default label spec for a run when none is given.
    pub async fn latest_active_classify_version<'e, E>(
        executor: E,
    ) -> Result<Option<PromptVersion>>
    where
        E: PgExecutor<'e>,
    {
        Self::active_version_for_stage(executor, PromptStage::Classify).await
    }
}

fn row_to_version(row: &sqlx::postgres::PgRow) -> Result<PromptVersion> {
    let stage_str: String =
        row.try_get("stage").map_err(|e| DaybookError::Database(e.to_string()))?;
    let stage = match stage_str.as_str() {
        "classify" => PromptStage::Classify,
        "summarize" => PromptStage::Summarize,
        other => return Err(DaybookError::Database(format!("unknown prompt stage `{other}`"))),
    };
    Ok(PromptVersion {
        id: row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?,
        prompt_id: row.try_get("prompt_id").map_err(|e| DaybookError::Database(e.to_string()))?,
        stage,
        model: row.try_get("model").map_err(|e| DaybookError::Database(e.to_string()))?,
        template_text: row
            .try_get("template_text")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        is_active: row.try_get("is_active").map_err(|e| DaybookError::Database(e.to_string()))?,
        is_stub: row.try_get("is_stub").map_err(|e| DaybookError::Database(e.to_string()))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
    })
}
