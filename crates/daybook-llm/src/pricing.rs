use chrono::Utc;
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::PricingSnapshot;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::types::{infer_provider, PricingEntry};

pub const STUB_MODEL: &str = "stub";

static PRICING_BOOK: Lazy<HashMap<&'static str, PricingEntry>> = Lazy::new(|| {
    let mut book = HashMap::new();
    book.insert(
        STUB_MODEL,
        PricingEntry { provider: "stub", input_per_1m_usd: 0.0, output_per_1m_usd: 0.0, cached_input_per_1m_usd: None },
    );
    book.insert(
        "gpt-4.1",
        PricingEntry {
            provider: "openai",
            input_per_1m_usd: 2.00,
            output_per_1m_usd: 8.00,
            cached_input_per_1m_usd: Some(0.50),
        },
    );
    book.insert(
        "gpt-4.1-mini",
        PricingEntry {
            provider: "openai",
            input_per_1m_usd: 0.40,
            output_per_1m_usd: 1.60,
            cached_input_per_1m_usd: Some(0.10),
        },
    );
    book.insert(
        "gpt-5",
        PricingEntry {
            provider: "openai",
            input_per_1m_usd: 1.25,
            output_per_1m_usd: 10.00,
            cached_input_per_1m_usd: Some(0.125),
        },
    );
    book.insert(
        "claude-opus-4-5",
        PricingEntry {
            provider: "anthropic",
            input_per_1m_usd: 15.00,
            output_per_1m_usd: 75.00,
            cached_input_per_1m_usd: Some(1.50),
        },
    );
    book.insert(
        "claude-sonnet-4-5",
        PricingEntry {
            provider: "anthropic",
            input_per_1m_usd: 3.00,
            output_per_1m_usd: 15.00,
            cached_input_per_1m_usd: Some(0.30),
        },
    );
    book.insert(
        "claude-haiku-4-5",
        PricingEntry {
            provider: "anthropic",
            input_per_1m_usd: 0.80,
            output_per_1m_usd: 4.00,
            cached_input_per_1m_usd: Some(0.08),
        },
    );
    book
});

/// Looks up `model` in the static pricing book and freezes it as a snapshot
/// stamped with the current time. Called once, at run creation; the run
/// then prices every future call against this frozen snapshot rather than
/// a live (and potentially later-updated) book entry.
pub fn snapshot_for_model(model: &str) -> Result<PricingSnapshot> {
    let entry = PRICING_BOOK
        .get(model)
        .ok_or_else(|| DaybookError::UnknownModelPricing { model: model.to_string() })?;

    Ok(PricingSnapshot {
        model: model.to_string(),
        provider: entry.provider.to_string(),
        input_per_1m_usd: entry.input_per_1m_usd,
        output_per_1m_usd: entry.output_per_1m_usd,
        cached_input_per_1m_usd: entry.cached_input_per_1m_usd,
        captured_at: Utc::now(),
    })
}

#[must_use]
pub fn cost_usd(snapshot: &PricingSnapshot, tokens_in: u32, tokens_out: u32) -> f64 {
    let input_cost = (f64::from(tokens_in) / 1_000_000.0) * snapshot.input_per_1m_usd;
    let output_cost = (f64::from(tokens_out) / 1_000_000.0) * snapshot.output_per_1m_usd;
    input_cost + output_cost
}

/// Asserts the provider inferred from `model` matches what the pricing book
/// says — catches the case where a new model is added to one but not the
/// other.
pub fn assert_provider_consistent(model: &str) -> Result<()> {
    let entry = PRICING_BOOK
        .get(model)
        .ok_or_else(|| DaybookError::UnknownModelPricing { model: model.to_string() })?;
    let inferred = infer_provider(model).as_str();
    if entry.provider != "stub" && entry.provider != inferred {
        return Err(DaybookError::Configuration {
            message: format!(
                "pricing book provider {} disagrees with inferred provider {inferred} for model {model}",
                entry.provider
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_model_is_free() {
        let snapshot = snapshot_for_model(STUB_MODEL).unwrap();
        assert_eq!(cost_usd(&snapshot, 10_000, 10_000), 0.0);
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(snapshot_for_model("not-a-real-model").is_err());
    }

    #[test]
    fn cost_scales_linearly_with_tokens() {
        let snapshot = snapshot_for_model("gpt-4.1").unwrap();
        let one = cost_usd(&snapshot, 1_000_000, 0);
        let two = cost_usd(&snapshot, 2_000_000, 0);
        assert!((two - one * 2.0).abs() < 1e-9);
    }

    #[test]
    fn every_non_stub_entry_matches_inferred_provider() {
        for model in ["gpt-4.1", "gpt-4.1-mini", "gpt-5", "claude-opus-4-5", "claude-sonnet-4-5", "claude-haiku-4-5"] {
            assert_provider_consistent(model).unwrap();
        }
    }
}
