//! Turns one segment of bundle text into its model summary.
//!
//! Thin by design: rate limiting, budget assertion, and cost accounting all
//! live in `daybook-llm`/`daybook-tick` — this crate only knows how to shape
//! the one prompt a summarize call needs.

use daybook_core::error::Result;
use daybook_core::model::PricingSnapshot;
use daybook_llm::{BudgetPolicy, LlmClient, LlmMessage, LlmRequest, LlmResult, SpendSoFar};

pub struct SummarizeInput<'a> {
    pub bundle_text: &'a str,
    pub model: &'a str,
    pub template_text: &'a str,
}

/// Calls the LLM client once for `input`. The stub model path is handled
/// transparently by `daybook-llm`'s `StubBackend` — this function always
/// goes through the same `LlmClient::call`, so stub vs. real is a
/// construction-time decision the caller already made.
pub async fn summarize(
    client: &LlmClient,
    input: &SummarizeInput<'_>,
    pricing: &PricingSnapshot,
    policy: &BudgetPolicy,
    spend: &SpendSoFar,
) -> Result<(LlmResult, f64)> {
    let request = LlmRequest {
        model: input.model.to_string(),
        system: Some(input.template_text.to_string()),
        messages: vec![LlmMessage::user(input.bundle_text.to_string())],
        temperature: Some(0.2),
        max_tokens: Some(2048),
    };

    client.call(&request, pricing, policy, spend).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use daybook_llm::StubBackend;

    #[tokio::test]
    async fn stub_summary_contains_marker_and_is_free() {
        let client = LlmClient::new(Box::new(StubBackend), 0);
        let pricing = daybook_llm::snapshot_for_model(daybook_llm::STUB_MODEL).unwrap();
        let policy = BudgetPolicy { max_usd_per_run: None, max_usd_per_day: None };
        let spend = SpendSoFar { run_spent_usd: 0.0, day_spent_usd: 0.0 };

        let input = SummarizeInput {
            bundle_text: "# SOURCE: chatgpt\n[2026-01-01T00:00:00.000Z] user: hello",
            model: daybook_llm::STUB_MODEL,
            template_text: "Summarize the user's day.",
        };

        let (result, cost) = summarize(&client, &input, &pricing, &policy, &spend).await.unwrap();
        assert!(result.text.contains("Summary (stub)"));
        assert_eq!(cost, 0.0);
    }
}
