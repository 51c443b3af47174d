//! Run creation: resolves a run's frozen configuration and fans it out into
//! one queued job per eligible calendar day.

use std::collections::BTreeSet;

use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{LabelSpec, PromptStage, Run, RunConfig, DEFAULT_MAX_INPUT_TOKENS};
use daybook_db::repo::{AtomRepo, FilterProfileRepo, ImportBatchRepo, JobRepo, PromptRepo, RunRepo};
use daybook_db::Database;

pub struct CreateRunRequest<'a> {
    /// Back-compat single-batch form. Mutually exclusive with `import_batch_ids`.
    pub import_batch_id: Option<&'a str>,
    pub import_batch_ids: Option<&'a [String]>,
    pub start_date: &'a str,
    pub end_date: &'a str,
    pub sources: &'a [String],
    /// Explicit label spec; when absent, the most recently created active
    /// classify prompt version is used.
    pub label_spec: Option<LabelSpec>,
    pub filter_profile_id: &'a str,
    /// Per-call token cap fed to the segmenter; defaults to
    /// `DEFAULT_MAX_INPUT_TOKENS` when unset.
    pub max_input_tokens: Option<usize>,
    pub max_usd_per_run: Option<f64>,
    pub max_usd_per_day: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CreateRunOutcome {
    pub run: Run,
    pub eligible_day_count: usize,
}

/// Builds the run's frozen configuration and job queue.
///
/// Fails with `NoEligibleDaysError` rather than creating an empty run — a
/// run with zero jobs would tick forever without ever completing.
pub async fn create_run(db: &Database, request: &CreateRunRequest<'_>) -> Result<CreateRunOutcome> {
    let batch_ids = normalize_batch_ids(request.import_batch_id, request.import_batch_ids)?;

    let batches = ImportBatchRepo::list_by_ids(&db.pool, &batch_ids).await?;
    if batches.len() != batch_ids.len() {
        let found: BTreeSet<&str> = batches.iter().map(|b| b.id.as_str()).collect();
        let missing = batch_ids.iter().find(|id| !found.contains(id.as_str())).cloned();
        return Err(DaybookError::NotFound {
            resource: "import_batch".to_string(),
            id: missing.unwrap_or_default(),
        });
    }

    let timezone = batches[0].timezone.clone();
    if let Some(mismatched) = batches.iter().find(|b| b.timezone != timezone) {
        return Err(DaybookError::TimezoneMismatch {
            details: format!(
                "batch {} uses timezone {} but batch {} uses {}",
                batches[0].id, timezone, mismatched.id, mismatched.timezone
            ),
        });
    }

    let summarize_version = PromptRepo::active_version_for_stage(&db.pool, PromptStage::Summarize)
        .await?
        .ok_or_else(|| DaybookError::NotFound {
            resource: "active summarize prompt version".to_string(),
            id: "stage=summarize".to_string(),
        })?;

    let label_spec = match request.label_spec.clone() {
        Some(spec) => spec,
        None => {
            let classify_version = PromptRepo::latest_active_classify_version(&db.pool)
                .await?
                .ok_or_else(|| DaybookError::NotFound {
                    resource: "active classify prompt version".to_string(),
                    id: "stage=classify".to_string(),
                })?;
            LabelSpec { model: classify_version.model, prompt_version_id: classify_version.id }
        }
    };

    let filter_profile = FilterProfileRepo::get(&db.pool, request.filter_profile_id)
        .await?
        .ok_or_else(|| DaybookError::NotFound {
            resource: "filter_profile".to_string(),
            id: request.filter_profile_id.to_string(),
        })?;

    let pricing_snapshot = daybook_llm::snapshot_for_model(&summarize_version.model)?;

    let config = RunConfig {
        label_spec: label_spec.clone(),
        filter_profile: filter_profile.clone(),
        summarize_prompt_version_id: summarize_version.id.clone(),
        pricing_snapshot,
        sources: request.sources.to_vec(),
        max_input_tokens: request.max_input_tokens.unwrap_or(DEFAULT_MAX_INPUT_TOKENS),
        max_usd_per_run: request.max_usd_per_run,
        max_usd_per_day: request.max_usd_per_day,
    };

    let filter_categories: Vec<String> =
        filter_profile.categories.iter().map(|c| c.as_str().to_string()).collect();

    let eligible_days = AtomRepo::eligible_day_dates(
        &db.pool,
        &batch_ids,
        request.sources,
        request.start_date,
        request.end_date,
        &label_spec.model,
        &label_spec.prompt_version_id,
        filter_profile.mode,
        &filter_categories,
    )
    .await?;

    if eligible_days.is_empty() {
        return Err(DaybookError::NoEligibleDays {
            start_date: request.start_date.to_string(),
            end_date: request.end_date.to_string(),
        });
    }

    let mut tx = db.pool.begin().await.map_err(|e| DaybookError::Database(e.to_string()))?;

    let run = RunRepo::create(
        &mut *tx,
        &daybook_db::repo::run::NewRun {
            start_date: request.start_date,
            end_date: request.end_date,
            timezone: &timezone,
            config: &config,
        },
    )
    .await?;

    for batch_id in &batch_ids {
        RunRepo::link_batch(&mut *tx, &run.id, batch_id).await?;
    }

    for day_date in &eligible_days {
        JobRepo::create(&mut *tx, &run.id, day_date).await?;
    }

    tx.commit().await.map_err(|e| DaybookError::Database(e.to_string()))?;

    Ok(CreateRunOutcome { eligible_day_count: eligible_days.len(), run })
}

/// Mutual exclusivity: a caller may pass the legacy single-id field or the
/// plural list, never a list alongside the singular field, and the
/// resulting set must be non-empty and duplicate-free.
fn normalize_batch_ids(
    single: Option<&str>,
    many: Option<&[String]>,
) -> Result<Vec<String>> {
    let ids: Vec<String> = match (single, many) {
        (Some(_), Some(_)) => {
            return Err(DaybookError::InvalidInput {
                message: "provide either import_batch_id or import_batch_ids, not both".to_string(),
            })
        }
        (Some(id), None) => vec![id.to_string()],
        (None, Some(ids)) => ids.to_vec(),
        (None, None) => {
            return Err(DaybookError::InvalidInput {
                message: "at least one import batch id is required".to_string(),
            })
        }
    };

    if ids.is_empty() {
        return Err(DaybookError::InvalidInput {
            message: "at least one import batch id is required".to_string(),
        });
    }
    let unique: BTreeSet<&String> = ids.iter().collect();
    if unique.len() != ids.len() {
        return Err(DaybookError::InvalidInput {
            message: "import batch id list contains duplicates".to_string(),
        });
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_both_forms_given_together() {
        let many = vec!["a".to_string()];
        let err = normalize_batch_ids(Some("b"), Some(&many)).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn normalize_rejects_neither_form_given() {
        assert!(normalize_batch_ids(None, None).is_err());
    }

    #[test]
    fn normalize_rejects_duplicate_ids() {
        let many = vec!["a".to_string(), "a".to_string()];
        assert!(normalize_batch_ids(None, Some(&many)).is_err());
    }

    #[test]
    fn normalize_accepts_single_id_back_compat() {
        let ids = normalize_batch_ids(Some("batch-1"), None).unwrap();
        assert_eq!(ids, vec!["batch-1".to_string()]);
    }

    #[test]
    fn normalize_accepts_plural_list() {
        let many = vec!["a".to_string(), "b".to_string()];
        let ids = normalize_batch_ids(None, Some(&many)).unwrap();
        assert_eq!(ids, many);
    }
}
