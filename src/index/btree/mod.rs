//! B-tree index implementation.
//!
//! - [`IndexNode`] - One node page: entries, sibling links, search cursor
//! - [`IndexTree`] - One tree: root, depth, per-level node cache, splits

mod node;
mod tree;

pub use node::{node_capacity, IndexNode, NODE_HEADER_SIZE};
pub use tree::{IndexInfo, IndexSummary, IndexTree};
