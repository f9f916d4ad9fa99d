use serde::{Deserialize, Serialize};

use super::rules::{Condition, Effect};

/// Transition target that ends the story instead of naming a node.
pub const END_GAME: &str = "[End Game]";

/// Id of the node every playthrough starts from.
pub const INTRO_NODE: &str = "intro";

/// Most dice a single roll node may throw.
pub const MAX_DICE: u32 = 100;

/// A player-selectable choice on a dialogue node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryOption {
    pub text: String,
    /// Target node id, the [`END_GAME`] sentinel, or empty.
    pub target: String,
    /// AND-combined; an empty list is always satisfied.
    pub conditions: Vec<Condition>,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub num_dice: u32,
    pub num_sides: u32,
    pub success_threshold: u32,
    pub success_node: String,
    pub failure_node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combat {
    /// Enemy ids; listed for display, they do not affect the outcome.
    pub enemies: Vec<String>,
    pub success_node: String,
    pub fail_node: String,
}

/// An item offered by a shop, or an item the shop buys from the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItem {
    pub name: String,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub items_for_sale: Vec<ShopItem>,
    pub items_to_buy: Vec<ShopItem>,
    pub currency_variable: String,
    pub continue_node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<String>,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub crafting_recipes: Vec<Recipe>,
    pub continue_node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub total_seconds: u64,
    pub show_countdown: bool,
    pub allow_skip: bool,
    pub next_node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomOutcome {
    pub description: String,
    pub weight: f64,
    pub next_node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomEvent {
    pub outcomes: Vec<RandomOutcome>,
    pub auto_trigger: bool,
}

/// Kind-specific behavior of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Dialogue { options: Vec<StoryOption> },
    DiceRoll(DiceRoll),
    Combat(Combat),
    Shop(Shop),
    Inventory(Inventory),
    Timer(Timer),
    RandomEvent(RandomEvent),
}

/// Discriminant of [`NodeKind`], handy for display and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKindTag {
    Dialogue,
    DiceRoll,
    Combat,
    Shop,
    Inventory,
    Timer,
    RandomEvent,
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            Self::Dialogue { .. } => NodeKindTag::Dialogue,
            Self::DiceRoll(_) => NodeKindTag::DiceRoll,
            Self::Combat(_) => NodeKindTag::Combat,
            Self::Shop(_) => NodeKindTag::Shop,
            Self::Inventory(_) => NodeKindTag::Inventory,
            Self::Timer(_) => NodeKindTag::Timer,
            Self::RandomEvent(_) => NodeKindTag::RandomEvent,
        }
    }
}

/// One unit of narrative content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub speaker: String,
    /// Template rendered through the text interpolator.
    pub text: String,
    pub chapter: String,
    /// Dialogue only: follow the first option after `auto_advance_delay`
    /// seconds.
    pub auto_advance: bool,
    pub auto_advance_delay: u64,
    pub kind: NodeKind,
}

impl Node {
    /// A plain dialogue node, mostly for building graphs in code.
    pub fn dialogue(id: &str, speaker: &str, text: &str, options: Vec<StoryOption>) -> Self {
        Self::with_kind(id, speaker, text, NodeKind::Dialogue { options })
    }

    pub fn with_kind(id: &str, speaker: &str, text: &str, kind: NodeKind) -> Self {
        Self {
            id: id.to_string(),
            speaker: speaker.to_string(),
            text: text.to_string(),
            chapter: String::new(),
            auto_advance: false,
            auto_advance_delay: 0,
            kind,
        }
    }

    /// Every outgoing transition as `(field label, target)`, in
    /// declaration order. Empty targets are included.
    pub fn transitions(&self) -> Vec<(String, &str)> {
        match &self.kind {
            NodeKind::Dialogue { options } => options
                .iter()
                .enumerate()
                .map(|(i, opt)| (format!("Choice #{}", i + 1), opt.target.as_str()))
                .collect(),
            NodeKind::DiceRoll(d) => vec![
                ("success node".to_string(), d.success_node.as_str()),
                ("failure node".to_string(), d.failure_node.as_str()),
            ],
            NodeKind::Combat(c) => vec![
                ("success node".to_string(), c.success_node.as_str()),
                ("fail node".to_string(), c.fail_node.as_str()),
            ],
            NodeKind::Shop(s) => vec![("continue node".to_string(), s.continue_node.as_str())],
            NodeKind::Inventory(i) => {
                vec![("continue node".to_string(), i.continue_node.as_str())]
            }
            NodeKind::Timer(t) => vec![("next node".to_string(), t.next_node.as_str())],
            NodeKind::RandomEvent(r) => r
                .outcomes
                .iter()
                .enumerate()
                .map(|(i, o)| (format!("Outcome #{}", i + 1), o.next_node.as_str()))
                .collect(),
        }
    }
}
