//! `daybook search` — full-text search over atoms (`raw`) or output text
//! (`outputs`), with keyset pagination.

use anyhow::Result;
use clap::{Args, ValueEnum};
use daybook_core::model::{Category, LabelSpec};
use daybook_db::Database;
use daybook_search::{search, SearchFilters, SearchRequest, SearchScope, DEFAULT_LIMIT};

use super::print_json;

#[derive(Clone, Copy, ValueEnum)]
pub enum SearchScopeArg {
    Raw,
    Outputs,
}

#[derive(Args)]
pub struct SearchArgs {
    #[arg(long, value_enum)]
    scope: SearchScopeArg,

    query: String,

    #[arg(long)]
    import_batch_id: Option<String>,

    #[arg(long)]
    run_id: Option<String>,

    #[arg(long)]
    start_date: Option<String>,

    #[arg(long)]
    end_date: Option<String>,

    #[arg(long = "source")]
    sources: Vec<String>,

    /// One of the 13 category names, case-insensitive (e.g. `work`,
    /// `mental_health`). Requires label context: either both
    /// `--label-model`/`--label-prompt-version-id`, or `--run-id` (whose
    /// frozen config resolves the label spec).
    #[arg(long = "category")]
    categories: Vec<String>,

    #[arg(long, requires = "label_prompt_version_id")]
    label_model: Option<String>,

    #[arg(long, requires = "label_model")]
    label_prompt_version_id: Option<String>,

    #[arg(long)]
    cursor: Option<String>,

    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: i64,
}

pub async fn run(db: &Database, args: SearchArgs) -> Result<()> {
    let scope = match args.scope {
        SearchScopeArg::Raw => SearchScope::Raw,
        SearchScopeArg::Outputs => SearchScope::Outputs,
    };

    let categories = args
        .categories
        .iter()
        .map(|c| {
            Category::from_str_upper(&c.to_ascii_uppercase())
                .ok_or_else(|| anyhow::anyhow!("unknown category {c:?}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let label_spec = match (args.label_model, args.label_prompt_version_id) {
        (Some(model), Some(prompt_version_id)) => Some(LabelSpec { model, prompt_version_id }),
        _ => None,
    };

    let page = search(
        db,
        &SearchRequest {
            scope,
            query: args.query,
            filters: SearchFilters {
                import_batch_id: args.import_batch_id,
                run_id: args.run_id,
                start_date: args.start_date,
                end_date: args.end_date,
                sources: args.sources,
                categories,
                label_spec,
            },
            cursor: args.cursor,
            limit: args.limit,
        },
    )
    .await?;

    print_json(&page_json(&page))
}

fn page_json(page: &daybook_search::SearchPage) -> serde_json::Value {
    let items: Vec<serde_json::Value> = page
        .items
        .iter()
        .map(|item| {
            let projection = match &item.projection {
                daybook_search::SearchProjection::Atom { source, role, day_date, import_batch_id } => {
                    serde_json::json!({
                        "kind": "atom",
                        "source": source,
                        "role": role,
                        "dayDate": day_date,
                        "importBatchId": import_batch_id,
                    })
                }
                daybook_search::SearchProjection::Output { run_id, day_date, stage } => {
                    serde_json::json!({
                        "kind": "output",
                        "runId": run_id,
                        "dayDate": day_date,
                        "stage": stage,
                    })
                }
            };
            serde_json::json!({
                "id": item.id,
                "rank": item.rank,
                "snippet": item.snippet,
                "projection": projection,
            })
        })
        .collect();

    serde_json::json!({
        "items": items,
        "nextCursor": page.next_cursor,
    })
}
