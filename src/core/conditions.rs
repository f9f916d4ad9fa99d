//! Option gating.

use rand::rngs::StdRng;
use tracing::debug;

use crate::core::expression::ExpressionEvaluator;
use crate::core::variables::VariableStore;
use crate::schema::rules::{Condition, Possession};
use crate::schema::state::GameState;
use crate::schema::value::Value;

pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn is_satisfied(condition: &Condition, state: &GameState, rng: &mut StdRng) -> bool {
        let satisfied = match condition {
            Condition::Stat { subject, op, value } => match value.as_number() {
                Some(threshold) => op.compare(state.stat(subject), threshold),
                None => false,
            },
            Condition::Item { subject, op } => {
                let held = state.has_item(subject);
                match op {
                    Possession::Has => held,
                    Possession::Lacks => !held,
                }
            }
            Condition::Flag { subject, op, value } => {
                op.holds(state.flag(subject) == value.as_bool())
            }
            Condition::Quest {
                subject,
                op,
                state: wanted,
            } => op.holds(state.quest_state(subject) == wanted),
            Condition::Variable { subject, op, value } => {
                let threshold = resolve_operand(value, state, rng);
                op.compare(state.variable(subject), threshold)
            }
        };
        debug!(%condition, satisfied, "condition checked");
        satisfied
    }

    /// AND over `conditions`; an empty list is always satisfied.
    pub fn all_satisfied(conditions: &[Condition], state: &GameState, rng: &mut StdRng) -> bool {
        conditions
            .iter()
            .all(|condition| Self::is_satisfied(condition, state, rng))
    }
}

/// Numeric operand of a variable condition or effect.
///
/// Strings with `{var}` tokens or arithmetic operators are evaluated as
/// expressions; other values are read as numbers, defaulting to `0`.
pub(crate) fn resolve_operand(value: &Value, state: &GameState, rng: &mut StdRng) -> f64 {
    match value {
        Value::String(text) if is_expression(text) => {
            ExpressionEvaluator::evaluate(text, state, rng)
        }
        other => other.as_number().unwrap_or(0.0),
    }
}

fn is_expression(text: &str) -> bool {
    text.contains('{') || text.contains(['+', '-', '*', '/'])
}
