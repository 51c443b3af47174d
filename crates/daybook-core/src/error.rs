use thiserror::Error;

/// The daybook error taxonomy.
///
/// Every variant carries named fields rather than an opaque string so
/// callers can match on `code()` without parsing a message. Library crates
/// return `Result<_, DaybookError>`; only the CLI binary converts into
/// `anyhow::Error`.
#[derive(Debug, Error)]
pub enum DaybookError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("no eligible days in range {start_date}..={end_date} for the given batches")]
    NoEligibleDays { start_date: String, end_date: String },

    #[error("batches have mismatched timezones: {details}")]
    TimezoneMismatch { details: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("a tick is already in progress for run {run_id}")]
    TickInProgress { run_id: String },

    #[error("export precondition failed for run {run_id}: {reason}")]
    ExportPrecondition { run_id: String, reason: String },

    #[error("export target not found: {run_id}")]
    ExportNotFound { run_id: String },

    #[error("no pricing entry for model {model}")]
    UnknownModelPricing { model: String },

    #[error("budget exceeded: {scope} limit ${limit_usd:.4} would be exceeded by ${attempted_usd:.4}")]
    BudgetExceeded {
        scope: String,
        limit_usd: f64,
        attempted_usd: f64,
    },

    #[error("missing API key for provider {provider}")]
    MissingApiKey { provider: String },

    #[error("LLM provider error ({provider}, retriable={retriable}): {message}")]
    LlmProvider {
        provider: String,
        retriable: bool,
        message: String,
    },

    #[error("LLM returned output that failed validation: {reason}")]
    LlmBadOutput { reason: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl DaybookError {
    /// Stable string code, analogous to an HTTP-problem `type` field.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            DaybookError::InvalidInput { .. } => "INVALID_INPUT",
            DaybookError::NotFound { .. } => "NOT_FOUND",
            DaybookError::NoEligibleDays { .. } => "NO_ELIGIBLE_DAYS",
            DaybookError::TimezoneMismatch { .. } => "TIMEZONE_MISMATCH",
            DaybookError::Conflict { .. } => "CONFLICT",
            DaybookError::TickInProgress { .. } => "TICK_IN_PROGRESS",
            DaybookError::ExportPrecondition { .. } => "EXPORT_PRECONDITION",
            DaybookError::ExportNotFound { .. } => "EXPORT_NOT_FOUND",
            DaybookError::UnknownModelPricing { .. } => "UNKNOWN_MODEL_PRICING",
            DaybookError::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            DaybookError::MissingApiKey { .. } => "MISSING_API_KEY",
            DaybookError::LlmProvider { .. } => "LLM_PROVIDER_ERROR",
            DaybookError::LlmBadOutput { .. } => "LLM_BAD_OUTPUT",
            DaybookError::Database(_) => "DATABASE_ERROR",
            DaybookError::Configuration { .. } => "CONFIGURATION_ERROR",
        }
    }

    /// Suggested HTTP status for a future route layer; also useful as a
    /// coarse retriability/severity signal in the CLI.
    #[must_use]
    pub fn http_status_hint(&self) -> u16 {
        match self {
            DaybookError::InvalidInput { .. }
            | DaybookError::NoEligibleDays { .. }
            | DaybookError::TimezoneMismatch { .. } => 400,
            DaybookError::NotFound { .. } | DaybookError::ExportNotFound { .. } => 404,
            DaybookError::Conflict { .. } | DaybookError::TickInProgress { .. } => 409,
            DaybookError::ExportPrecondition { .. } => 412,
            DaybookError::UnknownModelPricing { .. }
            | DaybookError::MissingApiKey { .. }
            | DaybookError::BudgetExceeded { .. }
            | DaybookError::LlmBadOutput { .. } => 422,
            DaybookError::LlmProvider { .. } => 502,
            DaybookError::Database(_) | DaybookError::Configuration { .. } => 500,
        }
    }

    /// Whether the caller may usefully retry the same operation unchanged.
    #[must_use]
    pub fn retriable(&self) -> bool {
        match self {
            DaybookError::LlmProvider { retriable, .. } => *retriable,
            DaybookError::TickInProgress { .. } => true,
            DaybookError::BudgetExceeded { .. } | DaybookError::MissingApiKey { .. } => false,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DaybookError>;
