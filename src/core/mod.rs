//! Runtime: evaluators, validation and the playthrough state machine.

pub mod conditions;
pub mod config;
pub mod effects;
pub mod engine;
pub mod expression;
pub mod interpolate;
pub mod validator;
pub mod variables;
