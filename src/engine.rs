//! Traversal state machine.
//!
//! `Active(node)` → first edge the oracle accepts → `Active(target)`.
//! No accepted edge, or an accepted edge pointing nowhere → `Terminated`,
//! which is absorbing.

use log::{debug, info, warn};

use crate::flow::{Node, TreeStore};
use crate::oracle::{Oracle, Verdict};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Active(String),
    Terminated,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// No edge's condition was satisfied (also the zero-edge case).
    NoMatch,
    /// An edge matched but its target is not in the tree.
    UnresolvedTarget(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank utterance: nothing happened, ask again.
    EmptyInput,
    Moved { from: String, to: String },
    Terminated(Termination),
    /// Input after termination is ignored.
    AlreadyTerminated,
}

/// Result of feeding one utterance to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub outcome: TurnOutcome,
    /// Oracle failures seen while evaluating this turn. Each one counted as a
    /// non-match for its edge.
    pub oracle_failures: Vec<String>,
}

impl Turn {
    fn new(outcome: TurnOutcome) -> Self {
        Self {
            outcome,
            oracle_failures: Vec::new(),
        }
    }
}

/// Current position of one conversation in the tree.
#[derive(Debug, Clone)]
pub struct Traversal {
    state: State,
}

impl Traversal {
    /// Start at the tree's root.
    pub fn new(tree: &TreeStore) -> Self {
        Self {
            state: State::Active(tree.root_id().to_string()),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == State::Terminated
    }

    pub fn current<'t>(&self, tree: &'t TreeStore) -> Option<&'t Node> {
        match &self.state {
            State::Active(id) => tree.lookup(id),
            State::Terminated => None,
        }
    }

    /// Evaluate one utterance against the current node's edges.
    ///
    /// Edges are asked in declared order and evaluation stops at the first
    /// yes, so overlapping conditions always resolve to the earliest edge.
    pub fn advance<O>(&mut self, tree: &TreeStore, oracle: &O, utterance: &str) -> Turn
    where
        O: Oracle + ?Sized,
    {
        let current_id = match &self.state {
            State::Active(id) => id.clone(),
            State::Terminated => return Turn::new(TurnOutcome::AlreadyTerminated),
        };

        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Turn::new(TurnOutcome::EmptyInput);
        }

        let Some(node) = tree.lookup(&current_id) else {
            // Only reachable if the state was built against another tree.
            warn!("Current node '{current_id}' is not in the tree; ending session");
            self.state = State::Terminated;
            return Turn::new(TurnOutcome::Terminated(Termination::UnresolvedTarget(
                current_id,
            )));
        };

        let mut failures = Vec::new();
        let mut matched = None;
        for (i, edge) in node.edges.iter().enumerate() {
            let verdict = oracle.classify(utterance, &edge.condition);
            debug!(
                "Edge {i} of '{}' ({:?}) -> {verdict:?}",
                node.node_id, edge.condition
            );
            match verdict {
                Verdict::Yes => {
                    matched = Some(edge);
                    break;
                }
                Verdict::No => {}
                Verdict::Failed(message) => failures.push(message),
            }
        }

        let outcome = match matched {
            Some(edge) if tree.lookup(&edge.target_node_id).is_some() => {
                info!("Transition: {} -> {}", node.node_id, edge.target_node_id);
                let outcome = TurnOutcome::Moved {
                    from: node.node_id.clone(),
                    to: edge.target_node_id.clone(),
                };
                self.state = State::Active(edge.target_node_id.clone());
                outcome
            }
            Some(edge) => {
                warn!(
                    "Edge '{}' of '{}' matched but target '{}' does not exist; ending session",
                    edge.condition, node.node_id, edge.target_node_id
                );
                self.state = State::Terminated;
                TurnOutcome::Terminated(Termination::UnresolvedTarget(
                    edge.target_node_id.clone(),
                ))
            }
            None => {
                info!("No matching condition at '{}'; ending session", node.node_id);
                self.state = State::Terminated;
                TurnOutcome::Terminated(Termination::NoMatch)
            }
        };

        Turn {
            outcome,
            oracle_failures: failures,
        }
    }
}
