use daybook_core::error::{DaybookError, Result};

/// The budget policy frozen into a run's config.
#[derive(Debug, Clone, Copy)]
pub struct BudgetPolicy {
    pub max_usd_per_run: Option<f64>,
    pub max_usd_per_day: Option<f64>,
}

/// Checks a prospective call against both caps. Called immediately before
/// and immediately after each provider call (never mid-call): a call that
/// starts within budget is allowed to finish even if, by the time it
/// returns, a concurrent job's spend would retroactively have put the run
/// over budget. This granularity is a recorded design decision, not an
/// oversight.
pub fn assert_within_budget(
    policy: &BudgetPolicy,
    run_spent_usd: f64,
    day_spent_usd: f64,
    next_cost_usd: f64,
) -> Result<()> {
    if let Some(limit) = policy.max_usd_per_run {
        let attempted = run_spent_usd + next_cost_usd;
        if attempted > limit {
            return Err(DaybookError::BudgetExceeded {
                scope: "run".to_string(),
                limit_usd: limit,
                attempted_usd: attempted,
            });
        }
    }
    if let Some(limit) = policy.max_usd_per_day {
        let attempted = day_spent_usd + next_cost_usd;
        if attempted > limit {
            return Err(DaybookError::BudgetExceeded {
                scope: "day".to_string(),
                limit_usd: limit,
                attempted_usd: attempted,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_limits_always_passes() {
        let policy = BudgetPolicy { max_usd_per_run: None, max_usd_per_day: None };
        assert!(assert_within_budget(&policy, 1000.0, 1000.0, 1000.0).is_ok());
    }

    #[test]
    fn run_limit_blocks_when_exceeded() {
        let policy = BudgetPolicy { max_usd_per_run: Some(10.0), max_usd_per_day: None };
        assert!(assert_within_budget(&policy, 9.0, 0.0, 0.5).is_ok());
        assert!(assert_within_budget(&policy, 9.5, 0.0, 1.0).is_err());
    }

    #[test]
    fn day_limit_is_independent_of_run_limit() {
        let policy = BudgetPolicy { max_usd_per_run: Some(100.0), max_usd_per_day: Some(1.0) };
        let result = assert_within_budget(&policy, 0.0, 0.9, 0.2);
        assert!(result.is_err());
    }
}
