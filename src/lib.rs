//! Story Engine: a runtime for branching visual-novel stories.
//!
//! Plays a graph of story nodes connected by player choices, gated by
//! conditions and mutating a small game state (stats, inventory, flags,
//! quests, numeric variables). The same engine drives an in-editor
//! preview and ships embedded in exported games.

pub mod core;
pub mod schema;
