use daybook_core::error::Result;
use daybook_core::model::PricingSnapshot;

use crate::backend::LlmBackend;
use crate::budget::{assert_within_budget, BudgetPolicy};
use crate::pricing::cost_usd;
use crate::rate_limiter::RateLimiter;
use crate::types::{LlmRequest, LlmResult};

/// A single call site's view of spend so far, supplied by the caller
/// (`daybook-tick`/`daybook-summarize`) since only they know a run's
/// current ledger.
pub struct SpendSoFar {
    pub run_spent_usd: f64,
    pub day_spent_usd: f64,
}

pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
    rate_limiter: RateLimiter,
}

impl LlmClient {
    #[must_use]
    pub fn new(backend: Box<dyn LlmBackend>, min_delay_ms: u64) -> Self {
        LlmClient { backend, rate_limiter: RateLimiter::new(min_delay_ms) }
    }

    /// Rate-limit, pre-check budget, call the provider, compute cost from
    /// the run's frozen pricing snapshot (not a live lookup), then
    /// post-check budget. Returns the result and its cost regardless of
    /// whether the post-check would have rejected it — the post-check is
    /// the caller's signal to stop scheduling further calls, not a reason
    /// to discard one that already happened.
    pub async fn call(
        &self,
        request: &LlmRequest,
        pricing: &PricingSnapshot,
        policy: &BudgetPolicy,
        spend: &SpendSoFar,
    ) -> Result<(LlmResult, f64)> {
        self.rate_limiter.acquire().await;

        // Pre-check with a conservative zero-cost placeholder: we don't
        // know the real cost until the call returns, so the pre-check only
        // guards against calling when already over budget.
        assert_within_budget(policy, spend.run_spent_usd, spend.day_spent_usd, 0.0)?;

        let result = self.backend.invoke(request).await?;
        let cost = cost_usd(pricing, result.tokens_in, result.tokens_out);

        assert_within_budget(policy, spend.run_spent_usd, spend.day_spent_usd, cost)?;

        Ok((result, cost))
    }
}
