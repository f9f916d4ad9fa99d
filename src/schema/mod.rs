//! Data model for authored stories and per-playthrough state.

pub mod graph;
pub mod node;
pub mod rules;
pub mod state;
pub mod value;
