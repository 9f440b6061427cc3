//! Fixed-total `DiceEvaluator` for tests.

use campaign_core::dice::{DiceEvaluator, RollOutcome};
use campaign_core::error::DomainError;

/// A dice evaluator that returns the same total for every expression.
#[derive(Debug, Clone, Copy)]
pub struct FixedDice(pub f64);

impl DiceEvaluator for FixedDice {
    fn evaluate(&self, expression: &str) -> Result<RollOutcome, DomainError> {
        if expression.trim().is_empty() {
            return Err(DomainError::Validation("empty dice expression".into()));
        }
        Ok(RollOutcome {
            expression: expression.to_owned(),
            rendered_expression: self.0.to_string(),
            total: self.0,
            successes: 0,
            failures: 0,
            rolls: Vec::new(),
        })
    }
}
