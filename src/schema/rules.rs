//! Typed conditions and effects attached to story options.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::Value;

/// Numeric comparison used by stat and variable conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparison {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    pub fn compare(&self, left: f64, right: f64) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Gt => left > right,
            Self::Lt => left < right,
            Self::Ge => left >= right,
            Self::Le => left <= right,
        }
    }
}

/// `is` / `is_not` for flags and quests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Equality {
    Is,
    IsNot,
}

impl Equality {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "is" => Some(Self::Is),
            "is_not" | "is not" => Some(Self::IsNot),
            _ => None,
        }
    }

    /// Applies the operator to the outcome of an equality test.
    pub fn holds(&self, equal: bool) -> bool {
        match self {
            Self::Is => equal,
            Self::IsNot => !equal,
        }
    }
}

/// `has` / `lacks` for inventory checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Possession {
    Has,
    Lacks,
}

impl Possession {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "has" => Some(Self::Has),
            "lacks" | "doesn't have" => Some(Self::Lacks),
            _ => None,
        }
    }
}

/// A predicate gating an option's visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Stat {
        subject: String,
        op: Comparison,
        value: Value,
    },
    Item {
        subject: String,
        op: Possession,
    },
    Flag {
        subject: String,
        op: Equality,
        value: Value,
    },
    Quest {
        subject: String,
        op: Equality,
        state: String,
    },
    /// `value` may be an expression with `{var}` tokens.
    Variable {
        subject: String,
        op: Comparison,
        value: Value,
    },
}

/// Arithmetic assignment on stats: `=`, `+=`, `-=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatOp {
    Set,
    Add,
    Sub,
}

impl StatOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "=" => Some(Self::Set),
            "+=" => Some(Self::Add),
            "-=" => Some(Self::Sub),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemOp {
    Add,
    Remove,
}

impl ItemOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// The full operator set for numeric variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Min,
    Max,
}

impl VariableOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "=" => Some(Self::Set),
            "+=" => Some(Self::Add),
            "-=" => Some(Self::Sub),
            "*=" => Some(Self::Mul),
            "/=" => Some(Self::Div),
            "%=" => Some(Self::Rem),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Set => "=",
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::Div => "/=",
            Self::Rem => "%=",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Combines `current` with `operand`. Returns `None` when the
    /// operation is a no-op (division or modulo by zero).
    pub fn combine(&self, current: f64, operand: f64) -> Option<f64> {
        match self {
            Self::Set => Some(operand),
            Self::Add => Some(current + operand),
            Self::Sub => Some(current - operand),
            Self::Mul => Some(current * operand),
            Self::Div if operand == 0.0 => None,
            Self::Div => Some(current / operand),
            Self::Rem if operand == 0.0 => None,
            // Floored modulo: the result takes the divisor's sign.
            Self::Rem => Some(current - operand * (current / operand).floor()),
            Self::Min => Some(current.min(operand)),
            Self::Max => Some(current.max(operand)),
        }
    }
}

/// A state mutation triggered by selecting an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Stat {
        subject: String,
        op: StatOp,
        value: Value,
    },
    Item {
        subject: String,
        op: ItemOp,
    },
    Flag {
        subject: String,
        value: Value,
    },
    Quest {
        subject: String,
        state: String,
    },
    /// `value` may be an expression with `{var}` tokens.
    Variable {
        subject: String,
        op: VariableOp,
        value: Value,
    },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stat { subject, op, value } => {
                write!(f, "stat {subject} {} {}", op.symbol(), value.as_text())
            }
            Self::Item { subject, op } => match op {
                Possession::Has => write!(f, "has {subject}"),
                Possession::Lacks => write!(f, "lacks {subject}"),
            },
            Self::Flag { subject, op, value } => {
                write!(f, "flag {subject} {} {}", equality_word(*op), value.as_text())
            }
            Self::Quest { subject, op, state } => {
                write!(f, "quest {subject} {} {state}", equality_word(*op))
            }
            Self::Variable { subject, op, value } => {
                write!(f, "{subject} {} {}", op.symbol(), value.as_text())
            }
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stat { subject, op, value } => {
                let symbol = match op {
                    StatOp::Set => "=",
                    StatOp::Add => "+=",
                    StatOp::Sub => "-=",
                };
                write!(f, "stat {subject} {symbol} {}", value.as_text())
            }
            Self::Item { subject, op } => match op {
                ItemOp::Add => write!(f, "add item {subject}"),
                ItemOp::Remove => write!(f, "remove item {subject}"),
            },
            Self::Flag { subject, value } => write!(f, "flag {subject} = {}", value.as_text()),
            Self::Quest { subject, state } => write!(f, "quest {subject} = {state}"),
            Self::Variable { subject, op, value } => {
                write!(f, "{subject} {} {}", op.symbol(), value.as_text())
            }
        }
    }
}

fn equality_word(op: Equality) -> &'static str {
    match op {
        Equality::Is => "is",
        Equality::IsNot => "is not",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_parsing() {
        assert_eq!(Comparison::parse(">="), Some(Comparison::Ge));
        assert_eq!(Comparison::parse(" != "), Some(Comparison::Ne));
        assert_eq!(Comparison::parse("=>"), None);
    }

    #[test]
    fn comparison_boundaries() {
        assert!(Comparison::Ge.compare(10.0, 10.0));
        assert!(!Comparison::Gt.compare(10.0, 10.0));
        assert!(Comparison::Le.compare(9.0, 10.0));
    }

    #[test]
    fn variable_op_zero_divisor_is_noop() {
        assert_eq!(VariableOp::Div.combine(10.0, 0.0), None);
        assert_eq!(VariableOp::Rem.combine(10.0, 0.0), None);
        assert_eq!(VariableOp::Div.combine(10.0, 4.0), Some(2.5));
    }

    #[test]
    fn variable_op_floored_modulo() {
        assert_eq!(VariableOp::Rem.combine(7.0, 3.0), Some(1.0));
        assert_eq!(VariableOp::Rem.combine(-7.0, 3.0), Some(2.0));
    }

    #[test]
    fn variable_op_min_max() {
        assert_eq!(VariableOp::Min.combine(8.0, 5.0), Some(5.0));
        assert_eq!(VariableOp::Max.combine(8.0, 5.0), Some(8.0));
    }

    #[test]
    fn editor_labels_are_accepted() {
        assert_eq!(Equality::parse("is not"), Some(Equality::IsNot));
        assert_eq!(Possession::parse("doesn't have"), Some(Possession::Lacks));
    }

    #[test]
    fn equality_negation() {
        assert!(Equality::IsNot.holds(false));
        assert!(!Equality::IsNot.holds(true));
    }

    #[test]
    fn conditions_display_in_authored_form() {
        let afford = Condition::Variable {
            subject: "gold".to_string(),
            op: Comparison::Ge,
            value: Value::String("{price} * 2".to_string()),
        };
        assert_eq!(afford.to_string(), "gold >= {price} * 2");

        let strong = Condition::Stat {
            subject: "strength".to_string(),
            op: Comparison::Lt,
            value: Value::Int(5),
        };
        assert_eq!(strong.to_string(), "stat strength < 5");

        let banned = Condition::Flag {
            subject: "banned".to_string(),
            op: Equality::IsNot,
            value: Value::Bool(true),
        };
        assert_eq!(banned.to_string(), "flag banned is not true");
    }

    #[test]
    fn effects_display_with_operator_symbols() {
        let halve = Effect::Variable {
            subject: "gold".to_string(),
            op: VariableOp::Div,
            value: Value::Int(2),
        };
        assert_eq!(halve.to_string(), "gold /= 2");

        let cap = Effect::Variable {
            subject: "hp".to_string(),
            op: VariableOp::Min,
            value: Value::Int(100),
        };
        assert_eq!(cap.to_string(), "hp min 100");

        let quest = Effect::Quest {
            subject: "rats".to_string(),
            state: "completed".to_string(),
        };
        assert_eq!(quest.to_string(), "quest rats = completed");
    }
}
