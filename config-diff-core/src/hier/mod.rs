//! Hierarchical model of indented CLI configuration.

pub mod parser;
pub mod tree;

pub use parser::{parse, parse_with_options, ParseOptions};
pub use tree::{children_equal, subtree_equal, HierNode, HierTree, NodeId};
