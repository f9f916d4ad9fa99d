//! State mutations triggered by options.

use rand::rngs::StdRng;
use tracing::debug;

use crate::core::conditions::resolve_operand;
use crate::core::variables::{format_number, VariableStore};
use crate::schema::rules::{Effect, ItemOp, StatOp};
use crate::schema::state::{GameState, InventoryItem, Quest};

pub struct EffectApplier;

impl EffectApplier {
    /// Applies `effects` in order and returns one line per change.
    ///
    /// Later effects observe the mutations of earlier ones. Nothing is
    /// rolled back; an effect that cannot apply (division by zero,
    /// removing an absent item) is skipped.
    pub fn apply(effects: &[Effect], state: &mut GameState, rng: &mut StdRng) -> Vec<String> {
        effects
            .iter()
            .filter_map(|effect| Self::apply_one(effect, state, rng))
            .collect()
    }

    fn apply_one(effect: &Effect, state: &mut GameState, rng: &mut StdRng) -> Option<String> {
        let change = match effect {
            Effect::Stat { subject, op, value } => {
                let operand = value.as_number().unwrap_or(0.0);
                let current = state.stat(subject);
                let updated = match op {
                    StatOp::Set => operand,
                    StatOp::Add => current + operand,
                    StatOp::Sub => current - operand,
                };
                state.stats.insert(subject.clone(), updated);
                Some(format!(
                    "{subject}: {} -> {}",
                    format_number(current),
                    format_number(updated)
                ))
            }
            Effect::Item {
                subject,
                op: ItemOp::Add,
            } => {
                if state.has_item(subject) {
                    None
                } else {
                    state.inventory.push(InventoryItem::new(subject, ""));
                    Some(format!("Gained {subject}"))
                }
            }
            Effect::Item {
                subject,
                op: ItemOp::Remove,
            } => state
                .remove_item(subject)
                .then(|| format!("Lost {subject}")),
            Effect::Flag { subject, value } => {
                let flag = value.as_bool();
                state.set_flag(subject, flag);
                Some(format!("{subject} = {flag}"))
            }
            Effect::Quest {
                subject,
                state: quest_state,
            } => {
                let quest = state
                    .quests
                    .entry(subject.clone())
                    .or_insert_with(|| Quest::new(subject));
                quest.state = quest_state.clone();
                Some(format!("Quest '{}' is now {quest_state}", quest.name))
            }
            Effect::Variable { subject, op, value } => {
                let operand = resolve_operand(value, state, rng);
                let current = state.variable(subject);
                match op.combine(current, operand) {
                    Some(updated) => {
                        state.set_variable(subject, updated);
                        Some(format!(
                            "{subject}: {} -> {}",
                            format_number(current),
                            format_number(updated)
                        ))
                    }
                    None => {
                        // Untouched variables still come into existence.
                        state.set_variable(subject, current);
                        None
                    }
                }
            }
        };

        debug!(%effect, change = change.as_deref().unwrap_or("no change"), "effect applied");
        change
    }
}
