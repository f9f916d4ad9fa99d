//! Flag and numeric-variable access shared by the evaluators.

use crate::schema::state::GameState;

/// Read/write access to story flags and numeric variables.
///
/// Reads never fail: a missing flag is `false` and a missing variable is
/// `0`. Writes are visible immediately to every later read.
pub trait VariableStore {
    fn flag(&self, name: &str) -> bool;
    fn set_flag(&mut self, name: &str, value: bool);
    fn variable(&self, name: &str) -> f64;
    fn set_variable(&mut self, name: &str, value: f64);
    fn has_variable(&self, name: &str) -> bool;
    fn has_flag(&self, name: &str) -> bool;
}

impl VariableStore for GameState {
    fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    fn set_flag(&mut self, name: &str, value: bool) {
        self.flags.insert(name.to_string(), value);
    }

    fn variable(&self, name: &str) -> f64 {
        self.variables.get(name).copied().unwrap_or(0.0)
    }

    fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }
}

/// Renders a number the way authors expect to read it: integral values
/// without a decimal point, everything else in shortest form.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_default_when_missing() {
        let state = GameState::default();
        assert!(!state.flag("met_guard"));
        assert_eq!(state.variable("gold"), 0.0);
        assert!(!state.has_variable("gold"));
    }

    #[test]
    fn writes_are_visible() {
        let mut state = GameState::default();
        state.set_flag("met_guard", true);
        state.set_variable("gold", 12.0);
        assert!(state.flag("met_guard"));
        assert_eq!(state.variable("gold"), 12.0);
        assert!(state.has_flag("met_guard"));
    }

    #[test]
    fn format_number_drops_integral_decimal() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
    }
}
