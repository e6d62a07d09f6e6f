use serde::{Deserialize, Serialize};

/// A single point in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node (e.g. "node1").
    pub node_id: String,
    /// The line shown to the user when entering this node.
    pub prompt: String,
    /// Outgoing transitions. Order matters: the first edge whose condition
    /// the oracle accepts wins.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// A conditional transition to another node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Natural-language acceptance criterion, e.g. "user is John".
    pub condition: String,
    /// Node to move to when `condition` is judged satisfied.
    pub target_node_id: String,
}

impl Node {
    pub fn new(node_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            prompt: prompt.into(),
            edges: Vec::new(),
        }
    }

    pub fn with_edge(mut self, condition: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(Edge {
            condition: condition.into(),
            target_node_id: target.into(),
        });
        self
    }

    /// A node without edges ends every conversation that reaches it.
    pub fn is_terminal(&self) -> bool {
        self.edges.is_empty()
    }
}
