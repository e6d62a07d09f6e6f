pub mod node;
pub mod tree;

pub use node::{Edge, Node};
pub use tree::{TreeReport, TreeStore};
