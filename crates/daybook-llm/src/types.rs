use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        LlmMessage { role: LlmRole::User, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<LlmMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LlmResult {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

/// Maps a model identifier to the provider whose wire format it speaks.
/// Anthropic model ids always start with `claude-`; everything else is
/// routed to the OpenAI-style Responses API adapter, which is also what the
/// stub/dry-run model name resolves to (it never reaches the network).
#[must_use]
pub fn infer_provider(model: &str) -> Provider {
    if model.starts_with("claude-") {
        Provider::Anthropic
    } else {
        Provider::OpenAi
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingEntry {
    pub provider: &'static str,
    pub input_per_1m_usd: f64,
    pub output_per_1m_usd: f64,
    pub cached_input_per_1m_usd: Option<f64>,
}
