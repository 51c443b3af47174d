//! Inputs to the export renderer. Built by the orchestrator from DB rows;
//! the renderer itself never talks to the database.

use chrono::{DateTime, Utc};
use daybook_core::model::MessageAtom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyTier {
    Private,
    Public,
}

/// V1 is the base tree; V2 turns on when the run's label spec resolves a
/// topic version (currently only `"topic_v1"` exists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatVersion {
    V1,
    V2 { topic_version: String },
}

impl FormatVersion {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            FormatVersion::V1 => "v1",
            FormatVersion::V2 { .. } => "v2",
        }
    }

    #[must_use]
    pub fn is_v2(&self) -> bool {
        matches!(self, FormatVersion::V2 { .. })
    }
}

/// One day's output plus (when the tier needs them) its raw atoms.
/// `raw_atoms` is `Some` exactly when the private tier requested atoms, or
/// V2 needs them to compute topics — `None` means the file/category data
/// isn't needed at all, not that the day happened to have zero atoms.
pub struct ExportDayInput {
    pub day_date: String,
    pub model: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub bundle_hash: String,
    pub bundle_context_hash: String,
    pub output_text: String,
    pub segmented: bool,
    pub segment_count: i32,
    pub raw_atoms: Option<Vec<ExportAtom>>,
}

/// A loaded atom plus its resolved category, when V2 is on.
pub struct ExportAtom {
    pub atom: MessageAtom,
    pub category: Option<daybook_core::model::Category>,
}

pub struct ExportBatchInput {
    pub import_batch_id: String,
    pub source: String,
    pub filename: String,
    pub timezone: String,
    pub file_size_bytes: i64,
    pub message_count: i64,
    pub unique_day_count: i64,
    pub first_day_date: Option<String>,
    pub last_day_date: Option<String>,
}

/// A topic's summary as recorded in a *previous* export's manifest, supplied
/// back in to compute `changelog.md`. The caller (CLI/API) is responsible
/// for persisting and handing back a prior manifest's `topics` map in this
/// shape; the renderer treats it as opaque input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousTopicSummary {
    pub topic_id: String,
    pub display_name: String,
    pub category: String,
    pub atom_count: i64,
    /// Sorted ascending.
    pub days: Vec<String>,
}

pub struct PreviousManifestInput {
    pub topics: Vec<PreviousTopicSummary>,
}

pub struct ExportInput {
    pub format_version: FormatVersion,
    pub privacy_tier: PrivacyTier,
    pub run_id: String,
    pub start_date: String,
    pub end_date: String,
    pub exported_at: DateTime<Utc>,
    /// Ascending by day_date.
    pub days: Vec<ExportDayInput>,
    /// Sorted by import_batch_id.
    pub batches: Vec<ExportBatchInput>,
    pub previous_manifest: Option<PreviousManifestInput>,
}
