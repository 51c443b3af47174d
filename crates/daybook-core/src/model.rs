//! Entity types shared across the pipeline. These mirror the persisted
//! schema in `daybook-db` but carry no persistence concerns of their own —
//! they're the shapes repositories hand back and components pass around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of 13 journal categories. Closed deliberately: adding a
/// fourteenth category is a schema migration, not a config change, since
/// filter profiles and exports both assume exhaustiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Work,
    Learning,
    Creative,
    Mundane,
    Personal,
    Other,
    Medical,
    MentalHealth,
    AddictionRecovery,
    Intimacy,
    Financial,
    Legal,
    Embarrassing,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Work,
        Category::Learning,
        Category::Creative,
        Category::Mundane,
        Category::Personal,
        Category::Other,
        Category::Medical,
        Category::MentalHealth,
        Category::AddictionRecovery,
        Category::Intimacy,
        Category::Financial,
        Category::Legal,
        Category::Embarrassing,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Work => "WORK",
            Category::Learning => "LEARNING",
            Category::Creative => "CREATIVE",
            Category::Mundane => "MUNDANE",
            Category::Personal => "PERSONAL",
            Category::Other => "OTHER",
            Category::Medical => "MEDICAL",
            Category::MentalHealth => "MENTAL_HEALTH",
            Category::AddictionRecovery => "ADDICTION_RECOVERY",
            Category::Intimacy => "INTIMACY",
            Category::Financial => "FINANCIAL",
            Category::Legal => "LEGAL",
            Category::Embarrassing => "EMBARRASSING",
        }
    }

    #[must_use]
    pub fn from_str_upper(s: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

pub use daybook_hash::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStage {
    Classify,
    Summarize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Summarize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Include,
    Exclude,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: String,
    pub source: String,
    pub timezone: String,
    pub filename: String,
    pub file_size_bytes: i64,
    pub message_count: i64,
    pub unique_day_count: i64,
    pub first_day_date: Option<String>,
    pub last_day_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAtom {
    pub atom_stable_id: String,
    pub source: String,
    pub source_conversation_id: Option<String>,
    pub source_message_id: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
    pub day_date: String,
    pub role: RoleValue,
    pub text: String,
    pub text_hash: String,
    pub import_batch_id: String,
}

/// `Role` lives in `daybook-hash` without serde derives (it's a pure
/// domain primitive used by hashing); this wrapper adds the
/// serialization this crate's consumers need without forcing a serde
/// dependency onto `daybook-hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleValue(pub Role);

impl Serialize for RoleValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for RoleValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<Role>()
            .map(RoleValue)
            .map_err(|_| serde::de::Error::custom(format!("invalid role: {s}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    pub id: String,
    pub source: String,
    pub day_date: String,
    pub content_text: String,
    pub content_hash: String,
    pub import_batch_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub stage: PromptStage,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersion {
    pub id: String,
    pub prompt_id: String,
    pub stage: PromptStage,
    pub model: String,
    pub template_text: String,
    pub is_active: bool,
    pub is_stub: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLabel {
    pub atom_stable_id: String,
    pub model: String,
    pub prompt_version_id: String,
    pub category: Category,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterProfile {
    pub id: String,
    pub name: String,
    pub mode: FilterMode,
    pub categories: Vec<Category>,
}

/// A (model, promptVersionId) pair identifying which label set a run reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelSpec {
    pub model: String,
    pub prompt_version_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub model: String,
    pub provider: String,
    pub input_per_1m_usd: f64,
    pub output_per_1m_usd: f64,
    pub cached_input_per_1m_usd: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

/// Default token cap for a single summarize call when a run doesn't pick
/// one explicitly; sized well under typical context windows so segmentation
/// kicks in before a provider-side truncation would.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 12_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub label_spec: LabelSpec,
    pub filter_profile: FilterProfile,
    pub summarize_prompt_version_id: String,
    pub pricing_snapshot: PricingSnapshot,
    pub sources: Vec<String>,
    pub max_input_tokens: usize,
    pub max_usd_per_run: Option<f64>,
    pub max_usd_per_day: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub start_date: String,
    pub end_date: String,
    pub timezone: String,
    pub status: RunStatus,
    pub config: RunConfig,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunBatch {
    pub run_id: String,
    pub import_batch_id: String,
}

/// Structured job failure, persisted as JSONB so the export/search surfaces
/// can read `code`/`retriable` without parsing a free-text message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub code: String,
    pub message: String,
    pub retriable: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub run_id: String,
    pub day_date: String,
    pub status: JobStatus,
    pub attempt: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<JobError>,
    /// Mirrors the tokens/cost of the job's one summarize output when it
    /// succeeded; preserved here too so a job that fails mid-segment keeps
    /// its partially accumulated spend even though no `Output` row exists
    /// to hold it (an output is only ever written atomically alongside a
    /// successful job).
    pub tokens_in: Option<i32>,
    pub tokens_out: Option<i32>,
    pub cost_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub id: String,
    pub job_id: String,
    pub kind: OutputKind,
    pub output_text: String,
    pub bundle_hash: String,
    pub bundle_context_hash: String,
    pub segmented: bool,
    pub segment_count: i32,
    pub segment_ids: Vec<String>,
    pub atom_count: i32,
    pub estimated_input_tokens: i32,
    pub tokens_in: i32,
    pub tokens_out: i32,
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRun {
    pub id: String,
    pub import_batch_id: String,
    pub model: String,
    pub prompt_version_id: String,
    pub newly_labeled: i64,
    pub already_labeled: i64,
    pub created_at: DateTime<Utc>,
}
