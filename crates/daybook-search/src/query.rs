//! The two FTS queries (`raw` over atoms, `outputs` over output text) plus
//! the validation §4.L requires before either runs: a `categories` filter
//! needs label context, and per this schema that context only ever reaches
//! atom rows (outputs have no direct atom linkage to join against), so
//! `sources`/`categories` on the `outputs` scope are rejected rather than
//! silently ignored.

use daybook_core::error::{DaybookError, Result};
use daybook_core::model::Category;
use daybook_db::repo::RunRepo;
use daybook_db::Database;
use sqlx::Row;

use crate::cursor::Cursor;
use crate::types::{SearchFilters, SearchPage, SearchProjection, SearchRequest, SearchResultItem, SearchScope};
use crate::types::{DEFAULT_LIMIT, MAX_LIMIT};

const HEADLINE_OPTIONS: &str = "StartSel=<<, StopSel=>>, MaxFragments=1, MaxWords=35, MinWords=15";

pub async fn search(db: &Database, request: &SearchRequest) -> Result<SearchPage> {
    let limit = clamp_limit(request.limit);
    let cursor = match &request.cursor {
        Some(raw) => Some(Cursor::decode(raw)?),
        None => None,
    };

    match request.scope {
        SearchScope::Raw => search_raw(db, request, &cursor, limit).await,
        SearchScope::Outputs => search_outputs(db, request, &cursor, limit).await,
    }
}

fn clamp_limit(requested: i64) -> i64 {
    if requested <= 0 {
        DEFAULT_LIMIT
    } else {
        requested.min(MAX_LIMIT)
    }
}

/// Resolves the `(model, promptVersionId)` a `categories` filter needs:
/// explicit `filters.label_spec` wins, otherwise it's read off the run named
/// by `filters.run_id`'s config. `None` when neither is available.
async fn resolve_label_context(
    db: &Database,
    filters: &SearchFilters,
) -> Result<Option<(String, String)>> {
    if let Some(spec) = &filters.label_spec {
        return Ok(Some((spec.model.clone(), spec.prompt_version_id.clone())));
    }
    if let Some(run_id) = &filters.run_id {
        let run = RunRepo::get(&db.pool, run_id).await?;
        return Ok(run.map(|r| (r.config.label_spec.model, r.config.label_spec.prompt_version_id)));
    }
    Ok(None)
}

fn categories_to_strings(categories: &[Category]) -> Vec<String> {
    categories.iter().map(|c| c.as_str().to_string()).collect()
}

async fn search_raw(
    db: &Database,
    request: &SearchRequest,
    cursor: &Option<Cursor>,
    limit: i64,
) -> Result<SearchPage> {
    let label_context = if request.filters.categories.is_empty() {
        None
    } else {
        let resolved = resolve_label_context(db, &request.filters).await?;
        if resolved.is_none() {
            return Err(DaybookError::InvalidInput {
                message: "categories filter requires label context (explicit labelSpec or a run_id)"
                    .to_string(),
            });
        }
        resolved
    };
    let (label_model, label_prompt_version_id) =
        label_context.map_or((None, None), |(m, p)| (Some(m), Some(p)));

    let categories = categories_to_strings(&request.filters.categories);
    let cursor_rank = cursor.as_ref().map(|c| c.rank);
    let cursor_id = cursor.as_ref().map(|c| c.id.clone());

    let rows = sqlx::query(
        "WITH scored AS (
            SELECT a.atom_stable_id AS id,
                   a.source AS source,
                   a.role AS role,
                   a.day_date::text AS day_date,
                   a.import_batch_id::text AS import_batch_id,
                   ts_rank(a.text_tsv, websearch_to_tsquery('english', $1)) AS rank,
                   ts_headline('english', a.text, websearch_to_tsquery('english', $1), $2) AS snippet
            FROM message_atoms a
            LEFT JOIN message_labels l
              ON l.atom_stable_id = a.atom_stable_id
             AND l.model = $3
             AND l.prompt_version_id = $4::uuid
            WHERE a.text_tsv @@ websearch_to_tsquery('english', $1)
              AND ($5::uuid IS NULL OR a.import_batch_id = $5)
              AND ($6::uuid IS NULL OR a.import_batch_id IN
                   (SELECT import_batch_id FROM run_batches WHERE run_id = $6))
              AND ($7::date IS NULL OR a.day_date >= $7)
              AND ($8::date IS NULL OR a.day_date <= $8)
              AND (COALESCE(array_length($9::text[], 1), 0) = 0 OR a.source = ANY($9))
              AND (COALESCE(array_length($10::text[], 1), 0) = 0 OR l.category = ANY($10))
         )
         SELECT id, source, role, day_date, import_batch_id, rank, snippet
         FROM scored
         WHERE $11::double precision IS NULL OR rank < $11 OR (rank = $11 AND id > $12)
         ORDER BY rank DESC, id ASC
         LIMIT $13",
    )
    .bind(&request.query)
    .bind(HEADLINE_OPTIONS)
    .bind(&label_model)
    .bind(&label_prompt_version_id)
    .bind(&request.filters.import_batch_id)
    .bind(&request.filters.run_id)
    .bind(&request.filters.start_date)
    .bind(&request.filters.end_date)
    .bind(&request.filters.sources)
    .bind(&categories)
    .bind(cursor_rank)
    .bind(&cursor_id)
    .bind(limit)
    .fetch_all(&db.pool)
    .await
    .map_err(|e| DaybookError::Database(e.to_string()))?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: String = row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?;
        let rank: f64 = row.try_get("rank").map_err(|e| DaybookError::Database(e.to_string()))?;
        let snippet: String =
            row.try_get("snippet").map_err(|e| DaybookError::Database(e.to_string()))?;
        let source: String = row.try_get("source").map_err(|e| DaybookError::Database(e.to_string()))?;
        let role: String = row.try_get("role").map_err(|e| DaybookError::Database(e.to_string()))?;
        let day_date: String =
            row.try_get("day_date").map_err(|e| DaybookError::Database(e.to_string()))?;
        let import_batch_id: String =
            row.try_get("import_batch_id").map_err(|e| DaybookError::Database(e.to_string()))?;

        items.push(SearchResultItem {
            id,
            rank,
            snippet,
            projection: SearchProjection::Atom {
                source: source.to_lowercase(),
                role: role.to_lowercase(),
                day_date,
                import_batch_id,
            },
        });
    }

    let next_cursor = next_cursor(&items, limit);
    Ok(SearchPage { items, next_cursor })
}

async fn search_outputs(
    db: &Database,
    request: &SearchRequest,
    cursor: &Option<Cursor>,
    limit: i64,
) -> Result<SearchPage> {
    if !request.filters.sources.is_empty() || !request.filters.categories.is_empty() {
        return Err(DaybookError::InvalidInput {
            message: "sources/categories filters are not supported for the outputs scope".to_string(),
        });
    }

    let cursor_rank = cursor.as_ref().map(|c| c.rank);
    let cursor_id = cursor.as_ref().map(|c| c.id.clone());

    let rows = sqlx::query(
        "WITH scored AS (
            SELECT o.id::text AS id,
                   j.run_id::text AS run_id,
                   j.day_date::text AS day_date,
                   ts_rank(o.output_tsv, websearch_to_tsquery('english', $1)) AS rank,
                   ts_headline('english', o.output_text, websearch_to_tsquery('english', $1), $2) AS snippet
            FROM outputs o
            JOIN jobs j ON j.id = o.job_id
            WHERE o.output_tsv @@ websearch_to_tsquery('english', $1)
              AND ($3::uuid IS NULL OR j.run_id = $3)
              AND ($4::uuid IS NULL OR j.run_id IN
                   (SELECT run_id FROM run_batches WHERE import_batch_id = $4))
              AND ($5::date IS NULL OR j.day_date >= $5)
              AND ($6::date IS NULL OR j.day_date <= $6)
         )
         SELECT id, run_id, day_date, rank, snippet
         FROM scored
         WHERE $7::double precision IS NULL OR rank < $7 OR (rank = $7 AND id > $8)
         ORDER BY rank DESC, id ASC
         LIMIT $9",
    )
    .bind(&request.query)
    .bind(HEADLINE_OPTIONS)
    .bind(&request.filters.run_id)
    .bind(&request.filters.import_batch_id)
    .bind(&request.filters.start_date)
    .bind(&request.filters.end_date)
    .bind(cursor_rank)
    .bind(&cursor_id)
    .bind(limit)
    .fetch_all(&db.pool)
    .await
    .map_err(|e| DaybookError::Database(e.to_string()))?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: String = row.try_get("id").map_err(|e| DaybookError::Database(e.to_string()))?;
        let rank: f64 = row.try_get("rank").map_err(|e| DaybookError::Database(e.to_string()))?;
        let snippet: String =
            row.try_get("snippet").map_err(|e| DaybookError::Database(e.to_string()))?;
        let run_id: String = row.try_get("run_id").map_err(|e| DaybookError::Database(e.to_string()))?;
        let day_date: String =
            row.try_get("day_date").map_err(|e| DaybookError::Database(e.to_string()))?;

        items.push(SearchResultItem {
            id,
            rank,
            snippet,
            projection: SearchProjection::Output { run_id, day_date, stage: "summarize".to_string() },
        });
    }

    let next_cursor = next_cursor(&items, limit);
    Ok(SearchPage { items, next_cursor })
}

fn next_cursor(items: &[SearchResultItem], limit: i64) -> Option<String> {
    if items.len() as i64 == limit {
        items.last().map(|last| Cursor { rank: last.rank, id: last.id.clone() }.encode())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_defaults_for_non_positive() {
        assert_eq!(clamp_limit(0), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(-5), DEFAULT_LIMIT);
    }

    #[test]
    fn clamp_limit_caps_at_max() {
        assert_eq!(clamp_limit(10_000), MAX_LIMIT);
    }

    #[test]
    fn clamp_limit_passes_through_in_range() {
        assert_eq!(clamp_limit(5), 5);
    }

    #[test]
    fn next_cursor_absent_when_page_is_short() {
        let items = vec![SearchResultItem {
            id: "a".to_string(),
            rank: 0.5,
            snippet: "s".to_string(),
            projection: SearchProjection::Output {
                run_id: "r".to_string(),
                day_date: "2026-01-01".to_string(),
                stage: "summarize".to_string(),
            },
        }];
        assert!(next_cursor(&items, 20).is_none());
    }

    #[test]
    fn next_cursor_present_when_page_is_full() {
        let items = vec![SearchResultItem {
            id: "a".to_string(),
            rank: 0.5,
            snippet: "s".to_string(),
            projection: SearchProjection::Output {
                run_id: "r".to_string(),
                day_date: "2026-01-01".to_string(),
                stage: "summarize".to_string(),
            },
        }];
        assert!(next_cursor(&items, 1).is_some());
    }
}
