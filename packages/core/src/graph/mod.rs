//! Graph Structure
//!
//! - `GraphIndex` - parent/child adjacency merged from edges and node fields
//! - `LineageWalker` - bounded ancestor/descendant traversal over an index

mod index;
mod lineage;

pub use index::{GraphIndex, IndexStats};
pub use lineage::LineageWalker;
