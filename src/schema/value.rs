use serde::{Deserialize, Serialize};

/// A loosely typed value as authored in conditions and effects.
///
/// Authoring tools write numbers, booleans and strings interchangeably,
/// so each consumer coerces the value to what its operator needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Default for Value {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl Value {
    /// Boolean coercion used by flags: only `true` or the string "true"
    /// (any case) count as true.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::String(s) => s.trim().eq_ignore_ascii_case("true"),
            Self::Int(_) | Self::Float(_) => false,
        }
    }

    /// Numeric view of a literal value. Strings are parsed; anything
    /// unparseable yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Text view, used for quest states and string comparisons.
    pub fn as_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => crate::core::variables::format_number(*f),
            Self::String(s) => s.clone(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_coercion() {
        assert!(Value::Bool(true).as_bool());
        assert!(Value::from("TRUE").as_bool());
        assert!(!Value::from("yes").as_bool());
        assert!(!Value::Int(1).as_bool());
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::from("12.5").as_number(), Some(12.5));
        assert_eq!(Value::Int(3).as_number(), Some(3.0));
        assert_eq!(Value::from("ten").as_number(), None);
    }

    #[test]
    fn untagged_json_shapes() {
        let values: Vec<Value> = serde_json::from_str(r#"[true, 10, 2.5, "active"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Bool(true),
                Value::Int(10),
                Value::Float(2.5),
                Value::String("active".to_string()),
            ]
        );
    }

    #[test]
    fn text_view_drops_integral_decimal() {
        assert_eq!(Value::Float(4.0).as_text(), "4");
        assert_eq!(Value::Float(4.5).as_text(), "4.5");
    }
}
