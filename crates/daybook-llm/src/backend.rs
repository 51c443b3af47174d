use async_trait::async_trait;
use daybook_core::error::{DaybookError, Result};
use serde_json::json;

use crate::types::{LlmRequest, LlmResult, LlmRole};

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResult>;
}

/// `retriable=true unless auth/quota`: 401/403 (auth) and 429 (quota) are
/// the only non-retriable HTTP statuses; everything else, including 5xx,
/// defaults to retriable.
#[must_use]
fn is_retriable_status(status: u16) -> bool {
    !matches!(status, 401 | 403 | 429)
}

/// Adapter for an OpenAI-style Responses API: a flat `input` array of
/// `{role, content}` objects plus a top-level `instructions` field for the
/// system prompt.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        OpenAiBackend {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1/responses".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResult> {
        let input: Vec<_> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        LlmRole::System => "system",
                        LlmRole::User => "user",
                        LlmRole::Assistant => "assistant",
                    },
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "input": input,
        });
        if let Some(system) = &request.system {
            body["instructions"] = json!(system);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_output_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DaybookError::LlmProvider {
                provider: "openai".to_string(),
                retriable: true,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| DaybookError::LlmProvider {
            provider: "openai".to_string(),
            retriable: true,
            message: format!("failed to parse response body: {e}"),
        })?;

        if !status.is_success() {
            let retriable = is_retriable_status(status.as_u16());
            return Err(DaybookError::LlmProvider {
                provider: "openai".to_string(),
                retriable,
                message: format!("HTTP {status}: {body}"),
            });
        }

        let text = body["output_text"]
            .as_str()
            .or_else(|| body["output"][0]["content"][0]["text"].as_str())
            .ok_or_else(|| DaybookError::LlmBadOutput {
                reason: "no output_text field in OpenAI response".to_string(),
            })?
            .to_string();

        let tokens_in = body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
        let tokens_out = body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(LlmResult { text, tokens_in, tokens_out })
    }
}

/// Adapter for an Anthropic-style Messages API: a `system` top-level field
/// and a `messages` array restricted to `user`/`assistant` roles.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        AnthropicBackend {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResult> {
        let messages: Vec<_> = request
            .messages
            .iter()
            .filter(|m| m.role != LlmRole::System)
            .map(|m| {
                json!({
                    "role": match m.role {
                        LlmRole::User => "user",
                        LlmRole::Assistant => "assistant",
                        LlmRole::System => unreachable!("filtered above"),
                    },
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| DaybookError::LlmProvider {
                provider: "anthropic".to_string(),
                retriable: true,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| DaybookError::LlmProvider {
            provider: "anthropic".to_string(),
            retriable: true,
            message: format!("failed to parse response body: {e}"),
        })?;

        if !status.is_success() {
            let retriable = is_retriable_status(status.as_u16());
            return Err(DaybookError::LlmProvider {
                provider: "anthropic".to_string(),
                retriable,
                message: format!("HTTP {status}: {body}"),
            });
        }

        let text = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| DaybookError::LlmBadOutput {
                reason: "no content[0].text field in Anthropic response".to_string(),
            })?
            .to_string();

        let tokens_in = body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
        let tokens_out = body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(LlmResult { text, tokens_in, tokens_out })
    }
}

/// Deterministic, zero-cost stand-in used whenever the run's model is the
/// stub model or the process is in dry-run mode. Never touches the
/// network.
pub struct StubBackend;

#[async_trait]
impl LlmBackend for StubBackend {
    async fn invoke(&self, _request: &LlmRequest) -> Result<LlmResult> {
        Ok(LlmResult {
            text: "Summary (stub): no model call was made.".to_string(),
            tokens_in: 0,
            tokens_out: 0,
        })
    }
}

/// Builds the HTTP backend matching `provider`, failing with
/// `MissingApiKeyError` when the matching environment credential is absent.
/// Construction-time failures only — there is no runtime fallback between
/// providers, since a run's provider is frozen at creation.
pub fn construct_backend(
    provider: crate::types::Provider,
    openai_api_key: Option<&str>,
    anthropic_api_key: Option<&str>,
) -> Result<Box<dyn LlmBackend>> {
    match provider {
        crate::types::Provider::OpenAi => {
            let key = openai_api_key.ok_or_else(|| DaybookError::MissingApiKey {
                provider: "openai".to_string(),
            })?;
            Ok(Box::new(OpenAiBackend::new(key.to_string())))
        }
        crate::types::Provider::Anthropic => {
            let key = anthropic_api_key.ok_or_else(|| DaybookError::MissingApiKey {
                provider: "anthropic".to_string(),
            })?;
            Ok(Box::new(AnthropicBackend::new(key.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_backend_never_calls_network_and_is_free() {
        let backend = StubBackend;
        let request = LlmRequest {
            model: "stub".to_string(),
            system: None,
            messages: vec![crate::types::LlmMessage::user("hi")],
            temperature: None,
            max_tokens: None,
        };
        let result = backend.invoke(&request).await.unwrap();
        assert!(result.text.contains("Summary (stub)"));
        assert_eq!(result.tokens_in, 0);
        assert_eq!(result.tokens_out, 0);
    }

    #[test]
    fn construct_backend_requires_matching_api_key() {
        let err = construct_backend(crate::types::Provider::OpenAi, None, None).unwrap_err();
        assert_eq!(err.code(), "MISSING_API_KEY");

        let err = construct_backend(crate::types::Provider::Anthropic, None, None).unwrap_err();
        assert_eq!(err.code(), "MISSING_API_KEY");
    }

    #[test]
    fn auth_and_quota_statuses_are_not_retriable() {
        assert!(!is_retriable_status(401));
        assert!(!is_retriable_status(403));
        assert!(!is_retriable_status(429));
    }

    #[test]
    fn other_failures_default_to_retriable() {
        assert!(is_retriable_status(400));
        assert!(is_retriable_status(500));
        assert!(is_retriable_status(503));
    }
}
