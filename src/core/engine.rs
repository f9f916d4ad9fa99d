//! The playthrough state machine.
//!
//! A `StoryEngine` owns one `GameState` and advances only in response to
//! discrete events: an option choice, a sub-action (dice, combat, shop,
//! crafting, random event) or a simulated clock tick. Every transition
//! goes through one path that ends the story on the end-game sentinel,
//! halts on an unknown node id and otherwise enters the target node.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::conditions::ConditionEvaluator;
use crate::core::config::{ConfigError, EngineConfig};
use crate::core::effects::EffectApplier;
use crate::core::interpolate::TextInterpolator;
use crate::core::variables::{format_number, VariableStore};
use crate::schema::graph::{Story, StoryError, StoryGraph};
use crate::schema::node::{NodeKind, NodeKindTag, RandomOutcome, END_GAME, INTRO_NODE, MAX_DICE};
use crate::schema::state::{GameState, InventoryItem};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("story error: {0}")]
    Story(#[from] StoryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("no story was provided to the builder")]
    NoStory,
    #[error("story has no '{INTRO_NODE}' node")]
    MissingIntro,
    #[error("node '{from}', {field}: unknown target node '{target}'")]
    UnknownNode {
        from: String,
        field: String,
        target: String,
    },
    #[error("no node with id '{0}'")]
    NoSuchNode(String),
    #[error("playthrough halted; restart to continue")]
    Halted,
    #[error("playthrough has not been started")]
    NotStarted,
    #[error("cannot {action} while {state}")]
    InvalidAction { action: &'static str, state: String },
    #[error("option {0} does not exist")]
    OptionOutOfRange(usize),
    #[error("option {0} is not available")]
    OptionUnavailable(usize),
    #[error("the shop does not trade in '{0}'")]
    UnknownShopItem(String),
    #[error("no recipe named '{0}'")]
    UnknownRecipe(String),
}

/// A pending time-based transition. Fires on the tick that brings
/// `remaining` to zero, or on the first tick when it is already zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    pub remaining: u64,
    pub target: String,
    /// Transition label reported if the target turns out to be unknown.
    pub field: String,
}

impl Countdown {
    fn new(seconds: u64, target: &str, field: impl Into<String>) -> Self {
        Self {
            remaining: seconds,
            target: target.to_string(),
            field: field.into(),
        }
    }

    /// Advances one second; returns true when the countdown is due.
    fn tick(&mut self) -> bool {
        if self.remaining <= 1 {
            self.remaining = 0;
            true
        } else {
            self.remaining -= 1;
            false
        }
    }
}

/// The drawn outcome of a random event, shown until its countdown fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOutcome {
    pub description: String,
    pub countdown: Countdown,
}

/// Multi-step interaction the current node is waiting on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubAction {
    DiceRoll,
    Combat,
    Shop,
    Inventory,
    Timer(Countdown),
    /// `None` until the event has been triggered.
    RandomEvent { outcome: Option<PendingOutcome> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineState {
    NotStarted,
    /// On a dialogue node, possibly counting down to an auto-advance.
    Running {
        node_id: String,
        auto_advance: Option<Countdown>,
    },
    AwaitingSubAction {
        node_id: String,
        action: SubAction,
    },
    Ended,
    Halted {
        reason: String,
    },
}

impl EngineState {
    fn label(&self) -> String {
        match self {
            Self::NotStarted => "not started".to_string(),
            Self::Running { node_id, .. } => format!("on dialogue node '{node_id}'"),
            Self::AwaitingSubAction { node_id, action } => {
                format!("awaiting {action:?} on node '{node_id}'")
            }
            Self::Ended => "the story has ended".to_string(),
            Self::Halted { .. } => "halted".to_string(),
        }
    }
}

/// Something the player can do right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    Choose { index: usize },
    RollDice,
    Fight,
    Buy { item: String, price: f64 },
    Sell { item: String, price: f64 },
    Craft { recipe: String },
    Leave,
    Skip,
    TriggerEvent,
    Continue,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleOption {
    /// Index into the node's full option list, as taken by
    /// [`StoryEngine::choose`].
    pub index: usize,
    pub text: String,
    pub target: String,
}

/// A node as the player sees it: rendered text and the options whose
/// conditions currently hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedNode {
    pub id: String,
    pub speaker: String,
    pub text: String,
    pub chapter: String,
    /// `None` for the end-of-story screen.
    pub kind: Option<NodeKindTag>,
    pub options: Vec<VisibleOption>,
    /// Set on timer nodes only.
    pub countdown: Option<CountdownView>,
}

/// What a host needs to draw a timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownView {
    pub remaining: u64,
    /// Whether the author wants the seconds shown.
    pub show: bool,
    pub can_skip: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiceOutcome {
    pub rolls: Vec<u32>,
    pub total: u64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombatOutcome {
    pub power: f64,
    pub victory: bool,
}

/// Saved progress: where the player is, what they carry, where they
/// have been.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub current_node: String,
    pub state: GameState,
    pub history: Vec<String>,
}

/// Render `node_id` against `state` without touching any playthrough.
pub fn render_node(
    graph: &StoryGraph,
    state: &GameState,
    node_id: &str,
    rng: &mut StdRng,
) -> Result<RenderedNode, EngineError> {
    let node = graph
        .get(node_id)
        .ok_or_else(|| EngineError::NoSuchNode(node_id.to_string()))?;

    let mut options = Vec::new();
    if let NodeKind::Dialogue { options: all } = &node.kind {
        for (index, opt) in all.iter().enumerate() {
            if ConditionEvaluator::all_satisfied(&opt.conditions, state, rng) {
                options.push(VisibleOption {
                    index,
                    text: TextInterpolator::render(&opt.text, state, rng),
                    target: opt.target.clone(),
                });
            }
        }
    }

    let countdown = match &node.kind {
        NodeKind::Timer(timer) => Some(CountdownView {
            remaining: timer.total_seconds,
            show: timer.show_countdown,
            can_skip: timer.allow_skip,
        }),
        _ => None,
    };

    Ok(RenderedNode {
        id: node.id.clone(),
        speaker: node.speaker.clone(),
        text: TextInterpolator::render(&node.text, state, rng),
        chapter: node.chapter.clone(),
        kind: Some(node.kind.tag()),
        options,
        countdown,
    })
}

/// One playthrough of a story. Built via `StoryEngine::builder()`.
pub struct StoryEngine {
    story: Story,
    config: EngineConfig,
    state: GameState,
    status: EngineState,
    history: Vec<String>,
    notices: Vec<String>,
    rng: StdRng,
}

/// Builder for constructing a `StoryEngine`.
pub struct StoryEngineBuilder {
    seed: Option<u64>,
    story_path: Option<String>,
    config_path: Option<String>,
    /// Directly provided story (for embedding and tests).
    story: Option<Story>,
    /// Directly provided config.
    config: Option<EngineConfig>,
}

impl StoryEngine {
    pub fn builder() -> StoryEngineBuilder {
        StoryEngineBuilder {
            seed: None,
            story_path: None,
            config_path: None,
            story: None,
            config: None,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.status
    }

    pub fn game_state(&self) -> &GameState {
        &self.state
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Every node entered this playthrough, without consecutive repeats.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Takes the feedback lines accumulated since the last drain.
    pub fn drain_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn current_node(&self) -> Option<&str> {
        match &self.status {
            EngineState::Running { node_id, .. } | EngineState::AwaitingSubAction { node_id, .. } => {
                Some(node_id.as_str())
            }
            _ => None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.status == EngineState::Ended
    }

    /// Begin a playthrough from fresh project defaults at the intro node.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if !self.story.graph.has_intro() {
            return Err(EngineError::MissingIntro);
        }
        self.state = self.story.defaults.clone();
        self.history.clear();
        self.notices.clear();
        info!(nodes = self.story.graph.nodes.len(), "playthrough started");
        self.enter(INTRO_NODE);
        Ok(())
    }

    /// Discard all progress, including a halt, and start over.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        info!("playthrough restarted");
        self.start()
    }

    /// The current screen: the rendered node, or the end message.
    pub fn view(&mut self) -> Result<RenderedNode, EngineError> {
        self.ensure_live()?;
        match &self.status {
            EngineState::Ended => Ok(RenderedNode {
                id: END_GAME.to_string(),
                speaker: self.config.end_speaker.clone(),
                text: self.config.end_text.clone(),
                chapter: String::new(),
                kind: None,
                options: Vec::new(),
                countdown: None,
            }),
            EngineState::Running { node_id, .. } | EngineState::AwaitingSubAction { node_id, .. } => {
                let mut rendered =
                    render_node(&self.story.graph, &self.state, node_id, &mut self.rng)?;
                if let (
                    Some(view),
                    EngineState::AwaitingSubAction {
                        action: SubAction::Timer(countdown),
                        ..
                    },
                ) = (&mut rendered.countdown, &self.status)
                {
                    view.remaining = countdown.remaining;
                }
                Ok(rendered)
            }
            EngineState::NotStarted | EngineState::Halted { .. } => Err(EngineError::NotStarted),
        }
    }

    /// What the player can do in the current state.
    pub fn available_actions(&mut self) -> Vec<PlayerAction> {
        let node = match &self.status {
            EngineState::Ended | EngineState::Halted { .. } => return vec![PlayerAction::Restart],
            EngineState::NotStarted => return Vec::new(),
            EngineState::Running { node_id, .. } | EngineState::AwaitingSubAction { node_id, .. } => {
                match self.story.graph.get(node_id) {
                    Some(node) => node,
                    None => return vec![PlayerAction::Restart],
                }
            }
        };

        match (&node.kind, &self.status) {
            (NodeKind::Dialogue { options }, EngineState::Running { auto_advance, .. }) => {
                let mut actions: Vec<PlayerAction> = options
                    .iter()
                    .enumerate()
                    .filter(|(_, opt)| {
                        ConditionEvaluator::all_satisfied(&opt.conditions, &self.state, &mut self.rng)
                    })
                    .map(|(index, _)| PlayerAction::Choose { index })
                    .collect();
                if auto_advance.is_some() {
                    actions.push(PlayerAction::Continue);
                }
                actions
            }
            (NodeKind::DiceRoll(_), _) => vec![PlayerAction::RollDice],
            (NodeKind::Combat(_), _) => vec![PlayerAction::Fight],
            (NodeKind::Shop(shop), _) => {
                let mut actions: Vec<PlayerAction> = shop
                    .items_for_sale
                    .iter()
                    .map(|item| PlayerAction::Buy {
                        item: item.name.clone(),
                        price: item.price,
                    })
                    .collect();
                actions.extend(shop.items_to_buy.iter().filter(|item| self.state.has_item(&item.name)).map(
                    |item| PlayerAction::Sell {
                        item: item.name.clone(),
                        price: item.price,
                    },
                ));
                actions.push(PlayerAction::Leave);
                actions
            }
            (NodeKind::Inventory(inventory), _) => {
                let mut actions: Vec<PlayerAction> = inventory
                    .crafting_recipes
                    .iter()
                    .map(|recipe| PlayerAction::Craft {
                        recipe: recipe.name.clone(),
                    })
                    .collect();
                actions.push(PlayerAction::Leave);
                actions
            }
            (NodeKind::Timer(timer), _) if timer.allow_skip => vec![PlayerAction::Skip],
            (NodeKind::Timer(_), _) => Vec::new(),
            (
                NodeKind::RandomEvent(_),
                EngineState::AwaitingSubAction {
                    action: SubAction::RandomEvent { outcome: Some(_) },
                    ..
                },
            ) => vec![PlayerAction::Continue],
            (NodeKind::RandomEvent(_), _) => vec![PlayerAction::TriggerEvent],
            (NodeKind::Dialogue { .. }, _) => Vec::new(),
        }
    }

    /// Dispatch a [`PlayerAction`] to the matching event method.
    pub fn perform(&mut self, action: &PlayerAction) -> Result<(), EngineError> {
        match action {
            PlayerAction::Choose { index } => self.choose(*index),
            PlayerAction::RollDice => self.roll_dice().map(|_| ()),
            PlayerAction::Fight => self.fight().map(|_| ()),
            PlayerAction::Buy { item, .. } => self.buy(item).map(|_| ()),
            PlayerAction::Sell { item, .. } => self.sell(item).map(|_| ()),
            PlayerAction::Craft { recipe } => self.craft(recipe).map(|_| ()),
            PlayerAction::Leave => self.leave(),
            PlayerAction::Skip => self.skip(),
            PlayerAction::TriggerEvent => self.trigger_event().map(|_| ()),
            PlayerAction::Continue => self.complete_pending(),
            PlayerAction::Restart => self.restart(),
        }
    }

    /// Select option `index` (an index into the node's full option list)
    /// on the current dialogue node. Its conditions are re-checked, its
    /// effects applied in order, then the option's target is entered.
    pub fn choose(&mut self, index: usize) -> Result<(), EngineError> {
        let (node_id, kind) = self.current_kind("choose an option")?;
        let NodeKind::Dialogue { options } = kind else {
            return Err(self.invalid("choose an option"));
        };
        let option = options
            .get(index)
            .ok_or(EngineError::OptionOutOfRange(index))?;
        if !ConditionEvaluator::all_satisfied(&option.conditions, &self.state, &mut self.rng) {
            return Err(EngineError::OptionUnavailable(index));
        }

        let changes = EffectApplier::apply(&option.effects, &mut self.state, &mut self.rng);
        self.notices.extend(changes);
        self.transition(&node_id, &format!("Choice #{}", index + 1), &option.target)
    }

    /// Roll the current dice node and follow the matching branch.
    pub fn roll_dice(&mut self) -> Result<DiceOutcome, EngineError> {
        let (node_id, kind) = self.current_kind("roll dice")?;
        let NodeKind::DiceRoll(dice) = kind else {
            return Err(self.invalid("roll dice"));
        };

        let sides = dice.num_sides.max(1);
        let rolls: Vec<u32> = (0..dice.num_dice.min(MAX_DICE))
            .map(|_| self.rng.gen_range(1..=sides))
            .collect();
        let total: u64 = rolls.iter().copied().map(u64::from).sum();
        let success = total >= u64::from(dice.success_threshold);
        debug!(node = %node_id, ?rolls, total, success, "dice rolled");

        let mut line = format!("Rolled: {total}");
        if rolls.len() > 1 {
            let parts: Vec<String> = rolls.iter().map(u32::to_string).collect();
            line.push_str(&format!(" ({})", parts.join(" + ")));
        }
        line.push_str(if success { " - Success!" } else { " - Failed!" });
        self.notices.push(line);

        let (field, target) = if success {
            ("success node", dice.success_node)
        } else {
            ("failure node", dice.failure_node)
        };
        self.transition(&node_id, field, &target)?;
        Ok(DiceOutcome {
            rolls,
            total,
            success,
        })
    }

    /// Resolve the current combat node from the player's stats.
    pub fn fight(&mut self) -> Result<CombatOutcome, EngineError> {
        let (node_id, kind) = self.current_kind("fight")?;
        let NodeKind::Combat(combat) = kind else {
            return Err(self.invalid("fight"));
        };

        let rules = &self.config.combat;
        let stat_or = |name: &str, fallback: f64| self.state.stats.get(name).copied().unwrap_or(fallback);
        let base = stat_or("strength", rules.default_strength)
            + stat_or("defense", rules.default_defense)
            + stat_or("health", rules.default_health) / 10.0;
        let factor = self.rng.gen_range(rules.factor_min..=rules.factor_max);
        let power = base * factor;
        let victory = power > rules.victory_threshold;
        debug!(node = %node_id, base, factor, power, victory, "combat resolved");

        self.notices.push(format!(
            "Combat Power: {power:.1} - {}",
            if victory { "Victory!" } else { "Defeat!" }
        ));

        let (field, target) = if victory {
            ("success node", combat.success_node)
        } else {
            ("fail node", combat.fail_node)
        };
        self.transition(&node_id, field, &target)?;
        Ok(CombatOutcome { power, victory })
    }

    /// Buy `item_name` from the current shop. Returns `Ok(false)` and
    /// leaves the state untouched when the player cannot afford it.
    pub fn buy(&mut self, item_name: &str) -> Result<bool, EngineError> {
        let (_, kind) = self.current_kind("buy")?;
        let NodeKind::Shop(shop) = kind else {
            return Err(self.invalid("buy"));
        };
        let item = shop
            .items_for_sale
            .iter()
            .find(|item| item.name == item_name)
            .ok_or_else(|| EngineError::UnknownShopItem(item_name.to_string()))?;

        let currency = &shop.currency_variable;
        let funds = self.state.variable(currency);
        let price = format_number(item.price);
        if funds < item.price {
            warn!(item = item_name, price = item.price, funds, "purchase refused");
            self.notices.push(format!(
                "Not enough {currency}! Need {price}, have {}",
                format_number(funds)
            ));
            return Ok(false);
        }

        self.state.set_variable(currency, funds - item.price);
        self.state.inventory.push(InventoryItem::new(
            &item.name,
            &format!("Purchased from shop for {price} {currency}"),
        ));
        self.notices
            .push(format!("Bought {item_name} for {price} {currency}!"));
        Ok(true)
    }

    /// Sell one `item_name` to the current shop. Returns `Ok(false)` when
    /// the player does not carry it.
    pub fn sell(&mut self, item_name: &str) -> Result<bool, EngineError> {
        let (_, kind) = self.current_kind("sell")?;
        let NodeKind::Shop(shop) = kind else {
            return Err(self.invalid("sell"));
        };
        let item = shop
            .items_to_buy
            .iter()
            .find(|item| item.name == item_name)
            .ok_or_else(|| EngineError::UnknownShopItem(item_name.to_string()))?;

        if !self.state.remove_item(item_name) {
            warn!(item = item_name, "sale refused, item not carried");
            self.notices
                .push(format!("You don't have {item_name} to sell!"));
            return Ok(false);
        }

        let currency = &shop.currency_variable;
        let funds = self.state.variable(currency);
        self.state.set_variable(currency, funds + item.price);
        self.notices.push(format!(
            "Sold {item_name} for {} {currency}!",
            format_number(item.price)
        ));
        Ok(true)
    }

    /// Craft `recipe_name` at the current inventory node. Returns
    /// `Ok(false)` when an ingredient is missing.
    pub fn craft(&mut self, recipe_name: &str) -> Result<bool, EngineError> {
        let (_, kind) = self.current_kind("craft")?;
        let NodeKind::Inventory(inventory) = kind else {
            return Err(self.invalid("craft"));
        };
        let recipe = inventory
            .crafting_recipes
            .iter()
            .find(|recipe| recipe.name == recipe_name)
            .ok_or_else(|| EngineError::UnknownRecipe(recipe_name.to_string()))?;

        let missing: Vec<&str> = recipe
            .ingredients
            .iter()
            .filter(|name| !self.state.has_item(name))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            warn!(recipe = recipe_name, ?missing, "crafting refused");
            self.notices
                .push(format!("Missing ingredients: {}", missing.join(", ")));
            return Ok(false);
        }

        for ingredient in &recipe.ingredients {
            self.state.remove_item(ingredient);
        }
        self.state.inventory.push(InventoryItem::new(
            &recipe.result,
            &format!("Crafted using {}", recipe.name),
        ));
        self.notices
            .push(format!("Successfully crafted {}!", recipe.result));
        Ok(true)
    }

    /// Leave the current shop or inventory node through its continue
    /// target.
    pub fn leave(&mut self) -> Result<(), EngineError> {
        let (node_id, kind) = self.current_kind("leave")?;
        let target = match kind {
            NodeKind::Shop(shop) => shop.continue_node,
            NodeKind::Inventory(inventory) => inventory.continue_node,
            _ => return Err(self.invalid("leave")),
        };
        self.transition(&node_id, "continue node", &target)
    }

    /// Skip the current timer, if the node allows it.
    pub fn skip(&mut self) -> Result<(), EngineError> {
        let (node_id, kind) = self.current_kind("skip the timer")?;
        match kind {
            NodeKind::Timer(timer) if timer.allow_skip => {
                self.transition(&node_id, "next node", &timer.next_node)
            }
            _ => Err(self.invalid("skip the timer")),
        }
    }

    /// Draw the outcome of a random event that was not auto-triggered.
    /// Returns the outcome description, or `None` for an event without
    /// outcomes.
    pub fn trigger_event(&mut self) -> Result<Option<String>, EngineError> {
        self.ensure_live()?;
        let delay = self.config.random_event_delay_secs;
        let EngineState::AwaitingSubAction {
            node_id,
            action: SubAction::RandomEvent { outcome: None },
        } = &self.status
        else {
            return Err(self.invalid("trigger a random event"));
        };
        let Some(NodeKind::RandomEvent(event)) = self.story.graph.get(node_id).map(|n| &n.kind) else {
            return Err(self.invalid("trigger a random event"));
        };

        let pending = draw_outcome(&event.outcomes, &mut self.rng, delay);
        let description = pending.as_ref().map(|p| p.description.clone());
        match &pending {
            Some(p) => self.notices.push(format!("Random Event: {}", p.description)),
            None => self.notices.push("Nothing happens.".to_string()),
        }
        if let EngineState::AwaitingSubAction {
            action: SubAction::RandomEvent { outcome },
            ..
        } = &mut self.status
        {
            *outcome = pending;
        }
        Ok(description)
    }

    /// Fire a pending random-event outcome or auto-advance immediately.
    pub fn complete_pending(&mut self) -> Result<(), EngineError> {
        self.ensure_live()?;
        let due = match &self.status {
            EngineState::Running {
                node_id,
                auto_advance: Some(countdown),
            } => (node_id.clone(), countdown.clone()),
            EngineState::AwaitingSubAction {
                node_id,
                action: SubAction::RandomEvent {
                    outcome: Some(pending),
                },
            } => (node_id.clone(), pending.countdown.clone()),
            _ => return Err(self.invalid("continue")),
        };
        self.transition(&due.0, &due.1.field, &due.1.target)
    }

    /// Advance the simulated clock by one second.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        self.ensure_live()?;
        let due = match &mut self.status {
            EngineState::Running {
                node_id,
                auto_advance: Some(countdown),
            }
            | EngineState::AwaitingSubAction {
                node_id,
                action: SubAction::Timer(countdown),
            }
            | EngineState::AwaitingSubAction {
                node_id,
                action:
                    SubAction::RandomEvent {
                        outcome: Some(PendingOutcome { countdown, .. }),
                    },
            } => {
                let fired = countdown.tick();
                debug!(node = %node_id, remaining = countdown.remaining, fired, "countdown tick");
                fired.then(|| (node_id.clone(), countdown.clone()))
            }
            _ => None,
        };
        match due {
            Some((from, countdown)) => self.transition(&from, &countdown.field, &countdown.target),
            None => Ok(()),
        }
    }

    /// Tick `seconds` times, stopping early once nothing is pending.
    pub fn advance(&mut self, seconds: u64) -> Result<(), EngineError> {
        for _ in 0..seconds {
            if !self.has_pending_countdown() {
                break;
            }
            self.tick()?;
        }
        Ok(())
    }

    pub fn has_pending_countdown(&self) -> bool {
        matches!(
            self.status,
            EngineState::Running {
                auto_advance: Some(_),
                ..
            } | EngineState::AwaitingSubAction {
                action: SubAction::Timer(_)
                    | SubAction::RandomEvent {
                        outcome: Some(_)
                    },
                ..
            }
        )
    }

    /// Move straight to `node_id` (or the end-game sentinel), for preview
    /// testing. Unknown ids are rejected without halting.
    pub fn jump_to(&mut self, node_id: &str) -> Result<(), EngineError> {
        self.ensure_live()?;
        if node_id == END_GAME {
            info!("jumped to end of story");
            self.status = EngineState::Ended;
            return Ok(());
        }
        if !self.story.graph.contains(node_id) {
            return Err(EngineError::NoSuchNode(node_id.to_string()));
        }
        self.enter(node_id);
        Ok(())
    }

    pub fn save_snapshot(&self) -> Result<String, EngineError> {
        let current_node = match &self.status {
            EngineState::Ended => END_GAME.to_string(),
            EngineState::Running { node_id, .. } | EngineState::AwaitingSubAction { node_id, .. } => {
                node_id.clone()
            }
            EngineState::Halted { .. } => return Err(EngineError::Halted),
            EngineState::NotStarted => return Err(EngineError::NotStarted),
        };
        let snapshot = Snapshot {
            current_node,
            state: self.state.clone(),
            history: self.history.clone(),
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// Restore a snapshot from [`save_snapshot`](Self::save_snapshot).
    /// The saved node is re-entered, so sub-actions start afresh.
    pub fn load_snapshot(&mut self, json: &str) -> Result<(), EngineError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        if snapshot.current_node != END_GAME && !self.story.graph.contains(&snapshot.current_node) {
            return Err(EngineError::NoSuchNode(snapshot.current_node));
        }

        self.state = snapshot.state;
        self.history = snapshot.history;
        self.notices.clear();
        info!(node = %snapshot.current_node, "snapshot loaded");
        if snapshot.current_node == END_GAME {
            self.status = EngineState::Ended;
        } else {
            self.enter(&snapshot.current_node);
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        match self.status {
            EngineState::Halted { .. } => Err(EngineError::Halted),
            EngineState::NotStarted => Err(EngineError::NotStarted),
            _ => Ok(()),
        }
    }

    fn invalid(&self, action: &'static str) -> EngineError {
        EngineError::InvalidAction {
            action,
            state: self.status.label(),
        }
    }

    /// The current node's id and kind, for an event that needs one.
    fn current_kind(&self, action: &'static str) -> Result<(String, NodeKind), EngineError> {
        self.ensure_live()?;
        self.current_node()
            .and_then(|id| self.story.graph.get(id))
            .map(|node| (node.id.clone(), node.kind.clone()))
            .ok_or_else(|| self.invalid(action))
    }

    /// Single transition path shared by every event.
    fn transition(&mut self, from: &str, field: &str, target: &str) -> Result<(), EngineError> {
        if target.is_empty() || target == END_GAME {
            info!(from, "story ended");
            self.status = EngineState::Ended;
            return Ok(());
        }
        if !self.story.graph.contains(target) {
            let err = EngineError::UnknownNode {
                from: from.to_string(),
                field: field.to_string(),
                target: target.to_string(),
            };
            error!(%err, "playthrough halted");
            self.status = EngineState::Halted {
                reason: err.to_string(),
            };
            return Err(err);
        }
        self.enter(target);
        Ok(())
    }

    /// Enter a node known to exist. Replaces the state wholesale, which
    /// cancels any countdown pending on the previous node.
    fn enter(&mut self, id: &str) {
        let Some(node) = self.story.graph.get(id) else {
            return;
        };
        if self.history.last().map(String::as_str) != Some(id) {
            self.history.push(id.to_string());
        }
        info!(node = id, kind = ?node.kind.tag(), "entered node");

        let node_id = id.to_string();
        let awaiting = |action: SubAction| EngineState::AwaitingSubAction {
            node_id: node_id.clone(),
            action,
        };
        self.status = match &node.kind {
            NodeKind::Dialogue { options } => {
                let auto_advance = match options.first() {
                    Some(first) if node.auto_advance => {
                        Some(Countdown::new(node.auto_advance_delay, &first.target, "Choice #1"))
                    }
                    _ => None,
                };
                EngineState::Running {
                    node_id: node_id.clone(),
                    auto_advance,
                }
            }
            NodeKind::DiceRoll(_) => awaiting(SubAction::DiceRoll),
            NodeKind::Combat(_) => awaiting(SubAction::Combat),
            NodeKind::Shop(_) => awaiting(SubAction::Shop),
            NodeKind::Inventory(_) => awaiting(SubAction::Inventory),
            NodeKind::Timer(timer) => awaiting(SubAction::Timer(Countdown::new(
                timer.total_seconds,
                &timer.next_node,
                "next node",
            ))),
            NodeKind::RandomEvent(event) => {
                let outcome = if event.auto_trigger {
                    let drawn = draw_outcome(
                        &event.outcomes,
                        &mut self.rng,
                        self.config.random_event_delay_secs,
                    );
                    if let Some(p) = &drawn {
                        self.notices.push(format!("Random Event: {}", p.description));
                    }
                    drawn
                } else {
                    None
                };
                awaiting(SubAction::RandomEvent { outcome })
            }
        };
    }
}

/// Cumulative-weight selection: draw `r` in `[0, total)` and take the
/// first outcome whose running weight reaches `r`.
fn draw_outcome(outcomes: &[RandomOutcome], rng: &mut StdRng, delay: u64) -> Option<PendingOutcome> {
    let total: f64 = outcomes.iter().map(|o| o.weight).sum();
    let r = rng.gen::<f64>() * total;

    let mut cumulative = 0.0;
    let mut chosen = None;
    for (index, outcome) in outcomes.iter().enumerate() {
        cumulative += outcome.weight;
        if r <= cumulative {
            chosen = Some((index, outcome));
            break;
        }
    }
    let (index, outcome) = chosen.or_else(|| outcomes.iter().enumerate().last())?;
    debug!(index, description = %outcome.description, "random outcome drawn");

    Some(PendingOutcome {
        description: outcome.description.clone(),
        countdown: Countdown::new(delay, &outcome.next_node, format!("Outcome #{}", index + 1)),
    })
}

impl StoryEngineBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn story_path(mut self, path: &str) -> Self {
        self.story_path = Some(path.to_string());
        self
    }

    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Provide the story directly (for embedding and tests).
    pub fn with_story(mut self, story: Story) -> Self {
        self.story = Some(story);
        self
    }

    /// Provide the config directly.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build an engine in the `NotStarted` state. A story file path takes
    /// precedence over a directly provided story.
    pub fn build(self) -> Result<StoryEngine, EngineError> {
        let story = match (&self.story_path, self.story) {
            (Some(path), _) => Story::load(Path::new(path))?,
            (None, Some(story)) => story,
            (None, None) => return Err(EngineError::NoStory),
        };

        let config = match &self.config_path {
            Some(path) => EngineConfig::load_from_ron(Path::new(path))?,
            None => self.config.unwrap_or_default(),
        };
        config.validate()?;

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(StoryEngine {
            state: story.defaults.clone(),
            story,
            config,
            status: EngineState::NotStarted,
            history: Vec::new(),
            notices: Vec::new(),
            rng,
        })
    }
}
