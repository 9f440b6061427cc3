//! Dice evaluator backed by `rand`.
//!
//! Understands sums of `NdM` terms and integer constants, e.g. `2d6+3` or
//! `d20 - 1`. A die showing its highest face counts as a success, a 1 as a
//! failure.

use campaign_core::dice::{DiceEvaluator, RollOutcome};
use campaign_core::error::DomainError;
use rand::Rng;

const MAX_DICE: u32 = 100;
const MAX_SIDES: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Dice { count: u32, sides: u32 },
    Constant(i64),
}

fn parse(expression: &str) -> Result<Vec<(i64, Term)>, DomainError> {
    let invalid = |detail: &str| {
        DomainError::Validation(format!("invalid dice expression '{expression}': {detail}"))
    };
    let compact: String = expression
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if compact.is_empty() {
        return Err(invalid("empty"));
    }

    let mut terms = Vec::new();
    let mut sign = 1;
    let mut leading_sign = false;
    let mut current = String::new();
    for ch in compact.chars() {
        if ch == '+' || ch == '-' {
            if current.is_empty() {
                if !terms.is_empty() || leading_sign {
                    return Err(invalid("operator without operand"));
                }
                leading_sign = true;
            } else {
                terms.push((sign, parse_term(&current).ok_or_else(|| invalid(&current))?));
                current.clear();
            }
            sign = if ch == '-' { -1 } else { 1 };
        } else {
            current.push(ch);
        }
    }
    if current.is_empty() {
        return Err(invalid("operator without operand"));
    }
    terms.push((sign, parse_term(&current).ok_or_else(|| invalid(&current))?));
    Ok(terms)
}

fn parse_term(term: &str) -> Option<Term> {
    let Some((count, sides)) = term.split_once('d') else {
        return term.parse().ok().map(Term::Constant);
    };
    let count = if count.is_empty() { 1 } else { count.parse().ok()? };
    let sides = sides.parse().ok()?;
    ((1..=MAX_DICE).contains(&count) && (2..=MAX_SIDES).contains(&sides))
        .then_some(Term::Dice { count, sides })
}

/// Rolls `expression` with `rng`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the expression cannot be parsed.
pub fn evaluate_with<R: Rng + ?Sized>(
    expression: &str,
    rng: &mut R,
) -> Result<RollOutcome, DomainError> {
    let terms = parse(expression)?;

    let mut total: i64 = 0;
    let mut rendered = String::new();
    let mut rolls = Vec::new();
    let mut successes = 0;
    let mut failures = 0;
    for (position, (sign, term)) in terms.into_iter().enumerate() {
        if sign < 0 {
            rendered.push('-');
        } else if position > 0 {
            rendered.push('+');
        }
        match term {
            Term::Constant(value) => {
                total += sign * value;
                rendered.push_str(&value.to_string());
            }
            Term::Dice { count, sides } => {
                let faces: Vec<i64> = (0..count)
                    .map(|_| i64::from(rng.random_range(1..=sides)))
                    .collect();
                for face in &faces {
                    if *face == i64::from(sides) {
                        successes += 1;
                    } else if *face == 1 {
                        failures += 1;
                    }
                }
                total += sign * faces.iter().sum::<i64>();
                let shown: Vec<String> = faces.iter().map(ToString::to_string).collect();
                rendered.push('[');
                rendered.push_str(&shown.join(", "));
                rendered.push(']');
                rolls.extend(faces);
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let total = total as f64;
    Ok(RollOutcome {
        expression: expression.trim().to_owned(),
        rendered_expression: rendered,
        total,
        successes,
        failures,
        rolls,
    })
}

/// Evaluator using the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDice;

impl DiceEvaluator for RandomDice {
    fn evaluate(&self, expression: &str) -> Result<RollOutcome, DomainError> {
        evaluate_with(expression, &mut rand::rng())
    }
}
