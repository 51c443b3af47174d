//! Request/response shapes for full-text search over the two scopes §4.L
//! defines: `raw` (atoms' text) and `outputs` (output text).

use daybook_core::model::{Category, LabelSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Raw,
    Outputs,
}

/// Every field optional/empty-by-default; an empty `Vec` means "no filter",
/// matching how `daybook-db`'s `eligible_day_dates` treats an empty category
/// list.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub import_batch_id: Option<String>,
    pub run_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sources: Vec<String>,
    pub categories: Vec<Category>,
    /// Explicit label context. When absent and `categories` is non-empty,
    /// `run_id` must be set so the label spec can be resolved from the
    /// run's config — otherwise the request is rejected.
    pub label_spec: Option<LabelSpec>,
}

pub struct SearchRequest {
    pub scope: SearchScope,
    pub query: String,
    pub filters: SearchFilters,
    /// Opaque cursor from a previous page's `SearchPage::next_cursor`.
    pub cursor: Option<String>,
    pub limit: i64,
}

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Source/role (atoms) or stage (outputs) are lowercased per §4.L.
#[derive(Debug, Clone)]
pub enum SearchProjection {
    Atom { source: String, role: String, day_date: String, import_batch_id: String },
    Output { run_id: String, day_date: String, stage: String },
}

#[derive(Debug, Clone)]
pub struct SearchResultItem {
    pub id: String,
    pub rank: f64,
    /// Ellipsised, `<<`/`>>`-highlighted excerpt around the match.
    pub snippet: String,
    pub projection: SearchProjection,
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<SearchResultItem>,
    /// `Some` when a full page was returned and more rows may follow.
    pub next_cursor: Option<String>,
}
