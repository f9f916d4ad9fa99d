//! Story graph, project defaults, and loading from JSON or RON.

use ron::extensions::Extensions;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use super::node::{
    Combat, DiceRoll, Inventory, Node, NodeKind, RandomEvent, RandomOutcome, Recipe, Shop,
    ShopItem, StoryOption, Timer, INTRO_NODE, MAX_DICE,
};
use super::rules::{
    Comparison, Condition, Effect, Equality, ItemOp, Possession, StatOp, VariableOp,
};
use super::state::{GameState, InventoryItem, Quest};
use super::value::Value;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node '{node}': {reason}")]
    InvalidNode { node: String, reason: String },
    #[error("unsupported story file extension: {0}")]
    UnsupportedFormat(String),
}

impl StoryError {
    fn invalid(node: &str, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            node: node.to_string(),
            reason: reason.into(),
        }
    }
}

/// The authored set of nodes. The entry point is always [`INTRO_NODE`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryGraph {
    pub nodes: HashMap<String, Node>,
}

impl StoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node keyed by its id, replacing any previous node with
    /// the same id.
    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn has_intro(&self) -> bool {
        self.contains(INTRO_NODE)
    }

    /// Node ids in sorted order, for stable reports.
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// A complete project: the graph plus the initial game state every
/// playthrough starts from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Story {
    pub graph: StoryGraph,
    pub defaults: GameState,
}

impl Story {
    /// Load a story file, picking the codec from the extension
    /// (`.json` or `.ron`).
    pub fn load(path: &Path) -> Result<Story, StoryError> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::load_from_json(path),
            Some("ron") => Self::load_from_ron(path),
            other => Err(StoryError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    pub fn load_from_json(path: &Path) -> Result<Story, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_json(&contents)
    }

    pub fn load_from_ron(path: &Path) -> Result<Story, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse the editor's JSON export.
    pub fn parse_json(input: &str) -> Result<Story, StoryError> {
        let raw: WireStory = serde_json::from_str(input)?;
        raw.into_story()
    }

    /// Parse a hand-authored RON story. Optional fields take bare values
    /// (`num_dice: 2`, not `num_dice: Some(2)`).
    pub fn parse_ron(input: &str) -> Result<Story, StoryError> {
        let raw: WireStory = ron::Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .from_str(input)?;
        raw.into_story()
    }
}

// Wire helpers. The editor writes loosely typed maps (camelCase and
// snake_case keys side by side, string operators), so it is read into
// these structs first and then converted into the typed model.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireStory {
    nodes: HashMap<String, WireNode>,
    player_stats: HashMap<String, f64>,
    player_inventory: Vec<InventoryItem>,
    story_flags: HashMap<String, bool>,
    variables: HashMap<String, f64>,
    quests: HashMap<String, Quest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireNode {
    node_type: Option<String>,
    #[serde(alias = "speaker")]
    npc: Option<String>,
    text: String,
    chapter: String,
    auto_advance: bool,
    auto_advance_delay: f64,
    options: Vec<WireOption>,
    // DiceRoll
    num_dice: Option<u32>,
    num_sides: Option<u32>,
    success_threshold: Option<u32>,
    success_node: String,
    failure_node: String,
    // Combat
    enemies: Vec<WireEnemy>,
    #[serde(rename = "successNode")]
    combat_success_node: String,
    #[serde(rename = "failNode")]
    combat_fail_node: String,
    // Shop
    items_for_sale: Vec<WireShopItem>,
    items_to_buy: Vec<WireShopItem>,
    currency_variable: Option<String>,
    continue_node: String,
    // Inventory
    crafting_recipes: Vec<WireRecipe>,
    // Timer
    total_seconds: Option<u64>,
    wait_time: Option<u64>,
    time_unit: Option<String>,
    show_countdown: Option<bool>,
    allow_skip: bool,
    next_node: String,
    // RandomEvent
    random_outcomes: Vec<WireOutcome>,
    auto_trigger: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireOption {
    text: String,
    #[serde(rename = "nextNode", alias = "next_node", alias = "target")]
    next_node: String,
    conditions: Vec<WireRule>,
    effects: Vec<WireRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireRule {
    #[serde(rename = "type", alias = "kind")]
    kind: Option<String>,
    subject: String,
    operator: Option<String>,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireEnemy {
    Id(String),
    Entry {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireShopItem {
    name: String,
    description: String,
    price: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireRecipe {
    name: String,
    ingredients: Vec<String>,
    result: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireOutcome {
    description: String,
    weight: Option<f64>,
    next_node: String,
}

impl WireStory {
    fn into_story(self) -> Result<Story, StoryError> {
        let mut graph = StoryGraph::new();
        for (id, raw) in self.nodes {
            graph.insert(raw.into_node(id)?);
        }
        Ok(Story {
            graph,
            defaults: GameState {
                stats: self.player_stats,
                inventory: self.player_inventory,
                flags: self.story_flags,
                variables: self.variables,
                quests: self.quests,
            },
        })
    }
}

impl WireNode {
    fn into_node(self, id: String) -> Result<Node, StoryError> {
        let node_type = self.node_type.as_deref().unwrap_or("Dialogue");
        let (default_speaker, kind) = match node_type {
            "Dialogue" | "Base" => {
                let options = self
                    .options
                    .into_iter()
                    .map(|opt| opt.into_option(&id))
                    .collect::<Result<Vec<_>, _>>()?;
                ("Narrator", NodeKind::Dialogue { options })
            }
            "DiceRoll" => {
                let num_dice = self.num_dice.unwrap_or(1);
                if num_dice > MAX_DICE {
                    return Err(StoryError::invalid(
                        &id,
                        format!("{num_dice} dice exceeds the limit of {MAX_DICE}"),
                    ));
                }
                (
                    "Dice Roll",
                    NodeKind::DiceRoll(DiceRoll {
                        num_dice,
                        num_sides: self.num_sides.unwrap_or(6),
                        success_threshold: self.success_threshold.unwrap_or(4),
                        success_node: self.success_node,
                        failure_node: self.failure_node,
                    }),
                )
            }
            "Combat" => (
                "Combat",
                NodeKind::Combat(Combat {
                    enemies: self.enemies.into_iter().map(WireEnemy::into_name).collect(),
                    success_node: first_non_empty(self.combat_success_node, self.success_node),
                    fail_node: first_non_empty(self.combat_fail_node, self.failure_node),
                }),
            ),
            "Shop" => (
                "Shopkeeper",
                NodeKind::Shop(Shop {
                    items_for_sale: self.items_for_sale.into_iter().map(Into::into).collect(),
                    items_to_buy: self.items_to_buy.into_iter().map(Into::into).collect(),
                    currency_variable: self
                        .currency_variable
                        .unwrap_or_else(|| "gold".to_string()),
                    continue_node: self.continue_node,
                }),
            ),
            "Inventory" => (
                "Inventory",
                NodeKind::Inventory(Inventory {
                    crafting_recipes: self
                        .crafting_recipes
                        .into_iter()
                        .map(|r| Recipe {
                            name: r.name,
                            ingredients: r.ingredients,
                            result: r.result,
                        })
                        .collect(),
                    continue_node: self.continue_node,
                }),
            ),
            "Timer" => {
                let total_seconds = match self.total_seconds {
                    Some(secs) => secs,
                    None => {
                        let unit = self.time_unit.as_deref().unwrap_or("seconds");
                        let multiplier = time_unit_seconds(unit).ok_or_else(|| {
                            StoryError::invalid(&id, format!("unknown time unit '{unit}'"))
                        })?;
                        self.wait_time
                            .unwrap_or(5)
                            .checked_mul(multiplier)
                            .ok_or_else(|| StoryError::invalid(&id, "wait time too large"))?
                    }
                };
                (
                    "System",
                    NodeKind::Timer(Timer {
                        total_seconds,
                        show_countdown: self.show_countdown.unwrap_or(true),
                        allow_skip: self.allow_skip,
                        next_node: self.next_node,
                    }),
                )
            }
            "RandomEvent" => (
                "Fate",
                NodeKind::RandomEvent(RandomEvent {
                    outcomes: self
                        .random_outcomes
                        .into_iter()
                        .map(|o| RandomOutcome {
                            description: o.description,
                            weight: o.weight.unwrap_or(1.0),
                            next_node: o.next_node,
                        })
                        .collect(),
                    auto_trigger: self.auto_trigger.unwrap_or(true),
                }),
            ),
            other => {
                return Err(StoryError::invalid(
                    &id,
                    format!("unknown node type '{other}'"),
                ))
            }
        };

        Ok(Node {
            speaker: self.npc.unwrap_or_else(|| default_speaker.to_string()),
            text: self.text,
            chapter: self.chapter,
            auto_advance: self.auto_advance,
            auto_advance_delay: self.auto_advance_delay.max(0.0).ceil() as u64,
            kind,
            id,
        })
    }
}

impl WireOption {
    fn into_option(self, node: &str) -> Result<StoryOption, StoryError> {
        let conditions = self
            .conditions
            .into_iter()
            .map(|rule| rule.into_condition(node))
            .collect::<Result<Vec<_>, _>>()?;
        let effects = self
            .effects
            .into_iter()
            .map(|rule| rule.into_effect(node))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StoryOption {
            text: self.text,
            target: self.next_node,
            conditions,
            effects,
        })
    }
}

impl WireRule {
    fn kind(&self) -> String {
        self.kind
            .as_deref()
            .unwrap_or("stat")
            .trim()
            .to_ascii_lowercase()
    }

    fn operator_or(&self, default: &str) -> String {
        self.operator
            .as_deref()
            .unwrap_or(default)
            .trim()
            .to_string()
    }

    fn into_condition(self, node: &str) -> Result<Condition, StoryError> {
        let kind = self.kind();
        let bad_op = |op: &str| {
            StoryError::invalid(node, format!("unknown {kind} condition operator '{op}'"))
        };
        let condition = match kind.as_str() {
            "stat" => {
                let op = self.operator_or(">=");
                Condition::Stat {
                    op: Comparison::parse(&op).ok_or_else(|| bad_op(&op))?,
                    subject: self.subject,
                    value: self.value.unwrap_or_default(),
                }
            }
            "item" => {
                let op = self.operator_or("has");
                Condition::Item {
                    op: Possession::parse(&op).ok_or_else(|| bad_op(&op))?,
                    subject: self.subject,
                }
            }
            "flag" => {
                let op = self.operator_or("is");
                Condition::Flag {
                    op: Equality::parse(&op).ok_or_else(|| bad_op(&op))?,
                    subject: self.subject,
                    value: self.value.unwrap_or(Value::Bool(true)),
                }
            }
            "quest" => {
                let op = self.operator_or("is");
                Condition::Quest {
                    op: Equality::parse(&op).ok_or_else(|| bad_op(&op))?,
                    subject: self.subject,
                    state: self.value.map(|v| v.as_text()).unwrap_or_default(),
                }
            }
            "variable" => {
                let op = self.operator_or(">=");
                Condition::Variable {
                    op: Comparison::parse(&op).ok_or_else(|| bad_op(&op))?,
                    subject: self.subject,
                    value: self.value.unwrap_or_default(),
                }
            }
            other => {
                return Err(StoryError::invalid(
                    node,
                    format!("unknown condition type '{other}'"),
                ))
            }
        };
        Ok(condition)
    }

    fn into_effect(self, node: &str) -> Result<Effect, StoryError> {
        let kind = self.kind();
        let bad_op =
            |op: &str| StoryError::invalid(node, format!("unknown {kind} effect operator '{op}'"));
        let effect = match kind.as_str() {
            "stat" => {
                let op = self.operator_or("+=");
                Effect::Stat {
                    op: StatOp::parse(&op).ok_or_else(|| bad_op(&op))?,
                    subject: self.subject,
                    value: self.value.unwrap_or_default(),
                }
            }
            "item" => {
                let op = self.operator_or("add");
                Effect::Item {
                    op: ItemOp::parse(&op).ok_or_else(|| bad_op(&op))?,
                    subject: self.subject,
                }
            }
            // The editor offers no operator for flags and quests; both
            // always assign.
            "flag" => Effect::Flag {
                subject: self.subject,
                value: self.value.unwrap_or(Value::Bool(true)),
            },
            "quest" => Effect::Quest {
                subject: self.subject,
                state: self.value.map(|v| v.as_text()).unwrap_or_default(),
            },
            "variable" => {
                let op = self.operator_or("+=");
                Effect::Variable {
                    op: VariableOp::parse(&op).ok_or_else(|| bad_op(&op))?,
                    subject: self.subject,
                    value: self.value.unwrap_or_default(),
                }
            }
            other => {
                return Err(StoryError::invalid(
                    node,
                    format!("unknown effect type '{other}'"),
                ))
            }
        };
        Ok(effect)
    }
}

impl WireEnemy {
    fn into_name(self) -> String {
        match self {
            Self::Id(id) => id,
            Self::Entry { id, name } => first_non_empty(name, id),
        }
    }
}

impl From<WireShopItem> for ShopItem {
    fn from(item: WireShopItem) -> Self {
        Self {
            name: item.name,
            description: item.description,
            price: item.price,
        }
    }
}

fn first_non_empty(preferred: String, fallback: String) -> String {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

fn time_unit_seconds(unit: &str) -> Option<u64> {
    match unit {
        "seconds" => Some(1),
        "minutes" => Some(60),
        "hours" => Some(3600),
        "days" => Some(86400),
        _ => None,
    }
}
