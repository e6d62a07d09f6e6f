use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, info, warn};

use crate::error::ConfigError;
use crate::flow::node::Node;

/// The loaded conversation tree: an ordered list of nodes plus an id index.
///
/// Read-only once built. Sessions share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TreeStore {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    root: usize,
}

impl TreeStore {
    /// Load the tree from a JSON file.
    ///
    /// `root` names the starting node; when `None` the first node in the file
    /// is used.
    pub fn load(path: impl AsRef<Path>, root: Option<&str>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ConfigError::TreeNotFound(path.to_path_buf()),
            _ => ConfigError::TreeRead {
                path: path.to_path_buf(),
                source,
            },
        })?;
        info!("Loading conversation tree from {}", path.display());
        Self::from_json(&content, root)
    }

    pub fn from_json(content: &str, root: Option<&str>) -> Result<Self, ConfigError> {
        let nodes: Vec<Node> = serde_json::from_str(content)?;
        Self::from_nodes(nodes, root)
    }

    pub fn from_nodes(nodes: Vec<Node>, root: Option<&str>) -> Result<Self, ConfigError> {
        if nodes.is_empty() {
            return Err(ConfigError::EmptyTree);
        }

        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.node_id.clone(), i).is_some() {
                return Err(ConfigError::DuplicateNode(node.node_id.clone()));
            }
        }

        let root = match root {
            Some(id) => *index
                .get(id)
                .ok_or_else(|| ConfigError::RootNotFound(id.to_string()))?,
            None => 0,
        };

        let store = Self { nodes, index, root };

        let report = store.report();
        for (from, target) in &report.dangling_edges {
            warn!("Node '{from}' has an edge to unknown node '{target}'; it will act as a dead end");
        }
        for id in &report.unreachable {
            warn!("Node '{id}' is unreachable from root '{}'", store.root_id());
        }
        debug!(
            "Tree loaded: {} nodes, root '{}'",
            store.nodes.len(),
            store.root_id()
        );

        Ok(store)
    }

    /// Find a node by id. Unknown ids are not an error here; callers decide.
    pub fn lookup(&self, node_id: &str) -> Option<&Node> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    pub fn root_id(&self) -> &str {
        &self.root().node_id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Structural summary of the tree as seen from the root.
    pub fn report(&self) -> TreeReport {
        let mut reachable = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self.root_id()]);
        let mut dangling_edges = Vec::new();

        while let Some(id) = queue.pop_front() {
            if !reachable.insert(id) {
                continue;
            }
            let Some(node) = self.lookup(id) else {
                continue;
            };
            order.push(id);
            for edge in &node.edges {
                if self.lookup(&edge.target_node_id).is_none() {
                    dangling_edges.push((node.node_id.clone(), edge.target_node_id.clone()));
                } else {
                    queue.push_back(edge.target_node_id.as_str());
                }
            }
        }

        let terminal = order
            .iter()
            .filter_map(|id| self.lookup(id))
            .filter(|node| node.is_terminal())
            .map(|node| node.node_id.clone())
            .collect();

        let unreachable = self
            .nodes
            .iter()
            .filter(|node| !reachable.contains(node.node_id.as_str()))
            .map(|node| node.node_id.clone())
            .collect();

        let mut path = HashSet::new();
        TreeReport {
            root: self.root_id().to_string(),
            total_nodes: self.nodes.len(),
            reachable: order.len(),
            terminal,
            dangling_edges,
            unreachable,
            max_turns: self.longest_path(self.root_id(), &mut path),
        }
    }

    /// Count the nodes with outgoing edges on the longest cycle-free path
    /// from `node_id`, i.e. the most turns a user can take.
    fn longest_path<'a>(&'a self, node_id: &'a str, path: &mut HashSet<&'a str>) -> usize {
        let node = match self.lookup(node_id) {
            Some(n) => n,
            None => return 0,
        };
        if node.is_terminal() || !path.insert(node_id) {
            return 0;
        }
        let max_child = node
            .edges
            .iter()
            .map(|edge| self.longest_path(&edge.target_node_id, path))
            .max()
            .unwrap_or(0);
        path.remove(node_id);
        1 + max_child
    }
}

/// Result of [`TreeStore::report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeReport {
    pub root: String,
    pub total_nodes: usize,
    pub reachable: usize,
    /// Reachable nodes without edges.
    pub terminal: Vec<String>,
    /// `(source node, missing target)` pairs reachable from the root.
    pub dangling_edges: Vec<(String, String)>,
    pub unreachable: Vec<String>,
    pub max_turns: usize,
}

impl TreeReport {
    pub fn is_clean(&self) -> bool {
        self.dangling_edges.is_empty() && self.unreachable.is_empty()
    }
}

impl fmt::Display for TreeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Root        : {}", self.root)?;
        writeln!(
            f,
            "  Nodes       : {} ({} reachable)",
            self.total_nodes, self.reachable
        )?;
        writeln!(f, "  Max turns   : {}", self.max_turns)?;
        writeln!(f, "  Terminal    : {}", self.terminal.join(", "))?;
        for (from, target) in &self.dangling_edges {
            writeln!(f, "  Dead end    : {from} -> {target} (unknown node)")?;
        }
        for id in &self.unreachable {
            writeln!(f, "  Unreachable : {id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"[
        {
            "nodeId": "node1",
            "prompt": "Are you John?",
            "edges": [
                { "condition": "user is John", "targetNodeId": "node2" },
                { "condition": "user is not John", "targetNodeId": "node3" }
            ]
        },
        {
            "nodeId": "node2",
            "prompt": "Hi John, how old are you?",
            "edges": [
                { "condition": "user gives an age", "targetNodeId": "node4" }
            ]
        },
        { "nodeId": "node3", "prompt": "Sorry, this chat is for John.", "edges": [] },
        { "nodeId": "node4", "prompt": "Thanks!" }
    ]"#;

    #[test]
    fn test_lookup_returns_declared_fields() {
        let tree = TreeStore::from_json(TREE, Some("node1")).unwrap();
        let node = tree.lookup("node1").unwrap();
        assert_eq!(node.prompt, "Are you John?");
        assert_eq!(node.edges.len(), 2);
        assert_eq!(node.edges[0].condition, "user is John");
        assert_eq!(node.edges[0].target_node_id, "node2");
        assert_eq!(node.edges[1].target_node_id, "node3");

        for id in ["node2", "node3", "node4"] {
            assert_eq!(tree.lookup(id).unwrap().node_id, id);
        }
    }

    #[test]
    fn test_missing_edges_default_to_empty() {
        let tree = TreeStore::from_json(TREE, None).unwrap();
        assert!(tree.lookup("node4").unwrap().is_terminal());
    }

    #[test]
    fn test_lookup_unknown_is_absent() {
        let tree = TreeStore::from_json(TREE, None).unwrap();
        assert!(tree.lookup("nope").is_none());
    }

    #[test]
    fn test_root_defaults_to_first_node() {
        let tree = TreeStore::from_json(TREE, None).unwrap();
        assert_eq!(tree.root_id(), "node1");
        let tree = TreeStore::from_json(TREE, Some("node2")).unwrap();
        assert_eq!(tree.root_id(), "node2");
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = TreeStore::from_json("[{\"nodeId\": ", None).unwrap_err();
        assert!(matches!(err, ConfigError::TreeParse(_)));
    }

    #[test]
    fn test_wrong_shape_is_config_error() {
        let err = TreeStore::from_json(r#"{"nodeId": "x"}"#, None).unwrap_err();
        assert!(matches!(err, ConfigError::TreeParse(_)));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            TreeStore::from_json("[]", None).unwrap_err(),
            ConfigError::EmptyTree
        ));

        let dup = r#"[{"nodeId": "a", "prompt": "1"}, {"nodeId": "a", "prompt": "2"}]"#;
        assert!(matches!(
            TreeStore::from_json(dup, None).unwrap_err(),
            ConfigError::DuplicateNode(id) if id == "a"
        ));

        assert!(matches!(
            TreeStore::from_json(TREE, Some("node9")).unwrap_err(),
            ConfigError::RootNotFound(id) if id == "node9"
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TreeStore::load(dir.path().join("absent.json"), None).unwrap_err();
        assert!(matches!(err, ConfigError::TreeNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversation_tree.json");
        std::fs::write(&path, TREE).unwrap();
        let tree = TreeStore::load(&path, Some("node1")).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.nodes()[3].node_id, "node4");
    }

    #[test]
    fn test_report_clean_tree() {
        let tree = TreeStore::from_json(TREE, None).unwrap();
        let report = tree.report();
        assert!(report.is_clean());
        assert_eq!(report.reachable, 4);
        assert_eq!(report.terminal, vec!["node3", "node4"]);
        assert_eq!(report.max_turns, 2);
    }

    #[test]
    fn test_report_dangling_and_unreachable() {
        let tree = TreeStore::from_nodes(
            vec![
                Node::new("a", "A").with_edge("c1", "missing"),
                Node::new("b", "B"),
            ],
            None,
        )
        .unwrap();
        let report = tree.report();
        assert_eq!(
            report.dangling_edges,
            vec![("a".to_string(), "missing".to_string())]
        );
        assert_eq!(report.unreachable, vec!["b"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_report_survives_cycles() {
        let tree = TreeStore::from_nodes(
            vec![
                Node::new("a", "A").with_edge("again", "b"),
                Node::new("b", "B").with_edge("back", "a").with_edge("done", "c"),
                Node::new("c", "C"),
            ],
            None,
        )
        .unwrap();
        let report = tree.report();
        assert_eq!(report.reachable, 3);
        assert_eq!(report.max_turns, 2);
    }
}
