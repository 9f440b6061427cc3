//! Dice evaluator port.
//!
//! Parsing and rolling dice expressions belongs to an external evaluator; the
//! engine only consumes its result.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Result of evaluating a dice expression such as `2d6+3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// The expression as supplied.
    pub expression: String,
    /// The expression with each die replaced by its rolled value.
    pub rendered_expression: String,
    /// Sum of the expression.
    pub total: f64,
    /// Dice counted as successes.
    pub successes: u32,
    /// Dice counted as failures.
    pub failures: u32,
    /// Individual die values in roll order.
    pub rolls: Vec<i64>,
}

/// Evaluates dice expressions.
pub trait DiceEvaluator: Send + Sync {
    /// Evaluates `expression`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the expression cannot be parsed.
    fn evaluate(&self, expression: &str) -> Result<RollOutcome, DomainError>;
}
