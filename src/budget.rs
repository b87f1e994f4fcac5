//! Step accounting shared by the sequencer and the path search.

use thiserror::Error;

/// Raised when a search runs out of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("search step budget of {limit} exhausted")]
pub struct BudgetExhausted {
    pub limit: u64,
}

/// Counts work units against a fixed limit.
#[derive(Debug, Clone)]
pub struct StepBudget {
    limit: u64,
    used: u64,
}

impl StepBudget {
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Consume one step.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetExhausted`] once `limit` steps have been taken.
    pub fn step(&mut self) -> Result<(), BudgetExhausted> {
        if self.used >= self.limit {
            return Err(BudgetExhausted { limit: self.limit });
        }
        self.used += 1;
        Ok(())
    }

    #[must_use]
    pub fn used(&self) -> u64 {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_allows_exactly_limit_steps() {
        let mut budget = StepBudget::new(3);
        assert!(budget.step().is_ok());
        assert!(budget.step().is_ok());
        assert!(budget.step().is_ok());
        assert_eq!(budget.step(), Err(BudgetExhausted { limit: 3 }));
        assert_eq!(budget.used(), 3);
    }

    #[test]
    fn test_zero_budget() {
        let mut budget = StepBudget::new(0);
        assert!(budget.step().is_err());
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_exhaustion_message() {
        let error = StepBudget::new(0).step().unwrap_err();
        assert_eq!(error.to_string(), "search step budget of 0 exhausted");
    }
}
