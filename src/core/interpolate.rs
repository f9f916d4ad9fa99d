//! Template rendering for node and option text.
//!
//! Passes run in a fixed order and each one sees the output of the
//! previous one:
//!
//! 1. `{variable}` becomes the variable's number.
//! 2. `{flag}` becomes `true` or `false`.
//! 3. `{=expression}` becomes the evaluated arithmetic.
//! 4. `{condition?yes:no}` becomes the branch picked by `condition`.
//!
//! Tokens that name neither a variable nor a flag are left in place.

use rand::rngs::StdRng;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::core::expression::ExpressionEvaluator;
use crate::core::variables::{format_number, VariableStore};
use crate::schema::state::GameState;

static NAME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid name token regex"));

static MATH_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{=([^}]+)\}").expect("valid math token regex"));

static CONDITIONAL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^?}]+)\?([^:}]*):([^}]*)\}").expect("valid conditional token regex")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier regex"));

/// Comparators in the order they are looked for. Two-character
/// operators come first so `>=` is not read as `>`.
const COMPARATORS: [&str; 6] = [">=", "<=", ">", "<", "==", "!="];

pub struct TextInterpolator;

impl TextInterpolator {
    pub fn render(template: &str, state: &GameState, rng: &mut StdRng) -> String {
        if template.is_empty() {
            return String::new();
        }

        let text = NAME_TOKEN.replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            if state.has_variable(name) {
                format_number(state.variable(name))
            } else {
                caps[0].to_string()
            }
        });

        let text = NAME_TOKEN.replace_all(&text, |caps: &Captures| {
            let name = &caps[1];
            if state.has_flag(name) {
                state.flag(name).to_string()
            } else {
                caps[0].to_string()
            }
        });

        let text = MATH_TOKEN.replace_all(&text, |caps: &Captures| {
            format_number(ExpressionEvaluator::evaluate(&caps[1], state, rng))
        });

        CONDITIONAL_TOKEN
            .replace_all(&text, |caps: &Captures| {
                if Self::evaluate_condition(caps[1].trim(), state) {
                    caps[2].trim().to_string()
                } else {
                    caps[3].trim().to_string()
                }
            })
            .into_owned()
    }

    /// Evaluates the condition half of a `{condition?yes:no}` token.
    ///
    /// Known variable and flag names are substituted first. Ordering
    /// comparators need numbers on both sides; `==` and `!=` compare
    /// numerically when both sides are numbers and as text otherwise. A
    /// bare operand is true when it is `true`, a non-zero number, or a
    /// set flag.
    pub fn evaluate_condition(condition: &str, state: &GameState) -> bool {
        let condition = IDENTIFIER.replace_all(condition, |caps: &Captures| {
            let name = &caps[0];
            if state.has_variable(name) {
                format_number(state.variable(name))
            } else if state.has_flag(name) {
                state.flag(name).to_string()
            } else {
                name.to_string()
            }
        });

        for symbol in COMPARATORS {
            if let Some((left, right)) = condition.split_once(symbol) {
                let (left, right) = (left.trim(), right.trim());
                let numbers = left.parse::<f64>().ok().zip(right.parse::<f64>().ok());
                return match (symbol, numbers) {
                    (">=", Some((l, r))) => l >= r,
                    ("<=", Some((l, r))) => l <= r,
                    (">", Some((l, r))) => l > r,
                    ("<", Some((l, r))) => l < r,
                    ("==", Some((l, r))) => l == r,
                    ("!=", Some((l, r))) => l != r,
                    ("==", None) => left == right,
                    ("!=", None) => left != right,
                    _ => false,
                };
            }
        }

        let bare = condition.trim().to_ascii_lowercase();
        match bare.as_str() {
            "true" => true,
            "false" | "" => false,
            other => match other.parse::<f64>() {
                Ok(n) => n != 0.0,
                Err(_) => state.flag(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn render(template: &str, state: &GameState) -> String {
        let mut rng = StdRng::seed_from_u64(3);
        TextInterpolator::render(template, state, &mut rng)
    }

    fn sample_state() -> GameState {
        let mut state = GameState::default();
        state.set_variable("gold", 12.0);
        state.set_variable("ratio", 0.5);
        state.set_flag("met_guard", true);
        state.set_flag("cursed", false);
        state
    }

    #[test]
    fn inline_expression() {
        assert_eq!(render("Total: {=2+3}", &GameState::default()), "Total: 5");
        assert_eq!(render("Half: {=7/2}", &GameState::default()), "Half: 3.5");
    }

    #[test]
    fn variables_and_flags() {
        let state = sample_state();
        assert_eq!(render("You have {gold} gold.", &state), "You have 12 gold.");
        assert_eq!(render("Ratio {ratio}", &state), "Ratio 0.5");
        assert_eq!(render("Met: {met_guard}", &state), "Met: true");
        assert_eq!(render("Cursed: {cursed}", &state), "Cursed: false");
    }

    #[test]
    fn unknown_tokens_are_left_alone() {
        let state = sample_state();
        assert_eq!(render("Hello {stranger}", &state), "Hello {stranger}");
    }

    #[test]
    fn variables_feed_expressions() {
        let state = sample_state();
        assert_eq!(render("Double: {={gold} * 2}", &state), "Double: 24");
    }

    #[test]
    fn conditional_branches() {
        let state = sample_state();
        assert_eq!(render("{gold >= 10 ? rich : poor}", &state), "rich");
        assert_eq!(render("{gold < 10 ? rich : poor}", &state), "poor");
        assert_eq!(render("The guard {met_guard ? nods : stares}.", &state), "The guard nods.");
        assert_eq!(render("{cursed ? doomed : fine}", &state), "fine");
        assert_eq!(render("{gold == 12 ? exact : off}", &state), "exact");
    }

    #[test]
    fn conditional_sees_earlier_substitution() {
        let state = sample_state();
        assert_eq!(render("{{gold} > 5 ? yes : no}", &state), "yes");
    }

    #[test]
    fn conditional_text_equality() {
        let state = GameState::default();
        assert!(TextInterpolator::evaluate_condition("north == north", &state));
        assert!(TextInterpolator::evaluate_condition("north != south", &state));
        assert!(!TextInterpolator::evaluate_condition("abc > 3", &state));
    }

    #[test]
    fn bare_operands() {
        let state = sample_state();
        assert!(TextInterpolator::evaluate_condition("true", &state));
        assert!(TextInterpolator::evaluate_condition("1", &state));
        assert!(TextInterpolator::evaluate_condition("gold", &state));
        assert!(!TextInterpolator::evaluate_condition("unknown_flag", &state));
    }

    #[test]
    fn empty_template() {
        assert_eq!(render("", &GameState::default()), "");
    }
}
