//! Full-text search (§4.L) over atoms (`raw` scope) and output text
//! (`outputs` scope), backed by the `tsvector`/GIN columns `daybook-db`'s
//! schema already provisions.

pub mod cursor;
pub mod query;
pub mod types;

pub use cursor::Cursor;
pub use query::search;
pub use types::{
    SearchFilters, SearchPage, SearchProjection, SearchRequest, SearchResultItem, SearchScope,
    DEFAULT_LIMIT, MAX_LIMIT,
};
