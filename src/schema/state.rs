use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of a quest nobody has touched yet. Effects may write any string.
pub const QUEST_INACTIVE: &str = "inactive";

/// An inventory entry. Names act as identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl InventoryItem {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_quest_state")]
    pub state: String,
}

fn default_quest_state() -> String {
    QUEST_INACTIVE.to_string()
}

impl Quest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            state: default_quest_state(),
        }
    }
}

/// The mutable snapshot of one playthrough.
///
/// Created from the project defaults at the start of a playthrough and
/// mutated only by the effect applier and the engine's sub-actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    #[serde(default)]
    pub stats: HashMap<String, f64>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub flags: HashMap<String, bool>,
    #[serde(default)]
    pub variables: HashMap<String, f64>,
    #[serde(default)]
    pub quests: HashMap<String, Quest>,
}

impl GameState {
    pub fn stat(&self, name: &str) -> f64 {
        self.stats.get(name).copied().unwrap_or(0.0)
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.inventory.iter().any(|item| item.name == name)
    }

    /// Number of inventory entries called `name`.
    pub fn item_count(&self, name: &str) -> usize {
        self.inventory.iter().filter(|item| item.name == name).count()
    }

    /// Removes the first entry called `name`. Returns whether one was found.
    pub fn remove_item(&mut self, name: &str) -> bool {
        match self.inventory.iter().position(|item| item.name == name) {
            Some(index) => {
                self.inventory.remove(index);
                true
            }
            None => false,
        }
    }

    /// Current state of a quest, `"inactive"` when the quest is unknown.
    pub fn quest_state(&self, id: &str) -> &str {
        self.quests
            .get(id)
            .map(|q| q.state.as_str())
            .unwrap_or(QUEST_INACTIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_default() {
        let state = GameState::default();
        assert_eq!(state.stat("strength"), 0.0);
        assert_eq!(state.quest_state("rescue"), QUEST_INACTIVE);
        assert!(!state.has_item("Key"));
    }

    #[test]
    fn remove_item_takes_first_match_only() {
        let mut state = GameState::default();
        state.inventory.push(InventoryItem::new("Herb", "green"));
        state.inventory.push(InventoryItem::new("Herb", "dried"));
        assert!(state.remove_item("Herb"));
        assert_eq!(state.item_count("Herb"), 1);
        assert_eq!(state.inventory[0].description, "dried");
        assert!(state.remove_item("Herb"));
        assert!(!state.remove_item("Herb"));
    }

    #[test]
    fn quest_defaults_to_inactive_when_deserialized() {
        let quest: Quest = serde_json::from_str(r#"{"name": "Find the key"}"#).unwrap();
        assert_eq!(quest.state, QUEST_INACTIVE);
    }
}
