//! Graph integrity checks run before export or play.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::fmt;

use crate::schema::graph::StoryGraph;
use crate::schema::node::{END_GAME, INTRO_NODE};

/// Outcome of [`GraphValidator::validate`]. Errors block export and
/// play; warnings are advisory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "error: {error}")?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}

pub struct GraphValidator;

impl GraphValidator {
    pub fn validate(graph: &StoryGraph) -> ValidationReport {
        let mut report = ValidationReport::default();

        if !graph.has_intro() {
            report.errors.push(format!(
                "Project must contain a node with the ID '{INTRO_NODE}' to start."
            ));
            return report;
        }

        let reachable = Self::reachable_from_intro(graph);
        let ids = graph.sorted_ids();

        for id in &ids {
            let node = &graph.nodes[*id];
            for (field, target) in node.transitions() {
                if !target.is_empty() && target != END_GAME && !graph.contains(target) {
                    report.errors.push(format!(
                        "Node '{id}', {field}: Links to non-existent node '{target}'."
                    ));
                }
            }
        }

        let unreachable: Vec<&str> = ids
            .iter()
            .copied()
            .filter(|id| !reachable.contains(id))
            .collect();
        if !unreachable.is_empty() {
            report.warnings.push(format!(
                "Unreachable nodes found: {}",
                unreachable.join(", ")
            ));
        }

        for id in &ids {
            let node = &graph.nodes[*id];
            if node.text.trim().is_empty() {
                report
                    .warnings
                    .push(format!("Node '{id}' has empty dialogue text."));
            }
            if node.speaker.trim().is_empty() {
                report.warnings.push(format!("Node '{id}' has empty NPC name."));
            }
        }

        report
    }

    /// Breadth-first walk from the intro node over every transition that
    /// resolves to a node in the graph.
    pub fn reachable_from_intro(graph: &StoryGraph) -> FxHashSet<&str> {
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();

        if let Some((id, _)) = graph.nodes.get_key_value(INTRO_NODE) {
            visited.insert(id.as_str());
            queue.push_back(id.as_str());
        }

        while let Some(current) = queue.pop_front() {
            let Some(node) = graph.get(current) else {
                continue;
            };
            for (_, target) in node.transitions() {
                if let Some((id, _)) = graph.nodes.get_key_value(target) {
                    if visited.insert(id.as_str()) {
                        queue.push_back(id.as_str());
                    }
                }
            }
        }

        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::node::{DiceRoll, Node, NodeKind, StoryOption};

    fn option(target: &str) -> StoryOption {
        StoryOption {
            text: "Go".to_string(),
            target: target.to_string(),
            conditions: vec![],
            effects: vec![],
        }
    }

    fn graph(nodes: Vec<Node>) -> StoryGraph {
        let mut graph = StoryGraph::new();
        for node in nodes {
            graph.insert(node);
        }
        graph
    }

    #[test]
    fn missing_intro_is_fatal() {
        let g = graph(vec![Node::dialogue("start", "Guard", "Hi", vec![])]);
        let report = GraphValidator::validate(&g);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("'intro'"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn clean_graph_has_no_errors() {
        let g = graph(vec![
            Node::dialogue("intro", "Guard", "Halt", vec![option("town"), option(END_GAME)]),
            Node::dialogue("town", "Narrator", "A busy square.", vec![option("")]),
        ]);
        let report = GraphValidator::validate(&g);
        assert!(report.is_ok(), "{report}");
        assert!(report.warnings.is_empty(), "{report}");
    }

    #[test]
    fn broken_link_names_node_and_field() {
        let g = graph(vec![Node::dialogue(
            "intro",
            "Guard",
            "Halt",
            vec![option(END_GAME), option("nowhere")],
        )]);
        let report = GraphValidator::validate(&g);
        assert_eq!(
            report.errors,
            vec!["Node 'intro', Choice #2: Links to non-existent node 'nowhere'.".to_string()]
        );
    }

    #[test]
    fn kind_specific_transitions_are_followed() {
        let dice = Node::with_kind(
            "intro",
            "Dice Roll",
            "Roll for it",
            NodeKind::DiceRoll(DiceRoll {
                num_dice: 1,
                num_sides: 6,
                success_threshold: 4,
                success_node: "win".to_string(),
                failure_node: "ghost".to_string(),
            }),
        );
        let g = graph(vec![
            dice,
            Node::dialogue("win", "Narrator", "You win.", vec![]),
            Node::dialogue("orphan", "Narrator", "Nobody comes here.", vec![]),
        ]);
        let report = GraphValidator::validate(&g);
        assert_eq!(
            report.errors,
            vec!["Node 'intro', failure node: Links to non-existent node 'ghost'.".to_string()]
        );
        assert_eq!(
            report.warnings,
            vec!["Unreachable nodes found: orphan".to_string()]
        );

        let reachable = GraphValidator::reachable_from_intro(&g);
        assert!(reachable.contains("win"));
        assert!(!reachable.contains("orphan"));
    }

    #[test]
    fn empty_content_is_a_warning() {
        let g = graph(vec![Node::dialogue("intro", "", "  ", vec![])]);
        let report = GraphValidator::validate(&g);
        assert!(report.is_ok());
        assert_eq!(
            report.warnings,
            vec![
                "Node 'intro' has empty dialogue text.".to_string(),
                "Node 'intro' has empty NPC name.".to_string(),
            ]
        );
    }
}
