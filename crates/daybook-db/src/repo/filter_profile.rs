use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{Category, FilterMode, FilterProfile};
use sqlx::{PgExecutor, Row};

pub struct FilterProfileRepo;

impl FilterProfileRepo {
    pub async fn get<'e, E>(executor: E, id: &str) -> Result<Option<FilterProfile>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT id::text, name, mode, categories FROM filter_profiles WHERE id = $1::uuid",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        row.as_ref().map(row_to_profile).transpose()
    }
}

fn row_to_profile(row: &sqlx::postgres::PgRow) -> Result<FilterProfile> {
    let mode_str: String = row.try_get("mode").map_err(|e| DaybookError::Database(e.to_string()))?;
    let mode = match mode_str.as_str() {
        "include" => FilterMode::Include,
        _ => FilterMode::Exclude,
    };
    let raw_categories: Vec<String> =
        row.try_get("categories").map_err(|e| DaybookError::Database(e.to_string()))?;
    let categories = raw_categories
        .iter()
        .filter_map(|c| Category::from_str_upper(c))
        .collect();

    Ok(FilterProfile {
        id: row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?,
        name: row.try_get("name").map_err(|e| DaybookError::Database(e.to_string()))?,
        mode,
        categories,
    })
}
