//! Canvas Document
//!
//! The persisted form of a canvas: its nodes and the parent → child edges the
//! UI maintains between them.

use super::node::{CanvasNode, NodeId};
use serde::{Deserialize, Serialize};

/// Directed link from a parent card to a child card
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Parent node
    pub source: NodeId,
    /// Child node
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Opaque document exchanged with workspace persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasDocument {
    #[serde(default)]
    pub nodes: Vec<CanvasNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edge_serialization_contract() {
        let edge = Edge::new("parent-1", "child-2");
        let value = serde_json::to_value(&edge).unwrap();
        assert_eq!(value, json!({ "source": "parent-1", "target": "child-2" }));
    }

    #[test]
    fn test_document_without_edges_loads() {
        let doc: CanvasDocument = serde_json::from_value(json!({
            "nodes": [{
                "id": "a",
                "prompt": "Q",
                "createdAt": "2025-01-03T10:00:00Z",
                "updatedAt": "2025-01-03T10:00:00Z"
            }]
        }))
        .unwrap();

        assert_eq!(doc.nodes.len(), 1);
        assert!(doc.edges.is_empty());
    }

    #[test]
    fn test_self_loop_detection() {
        assert!(Edge::new("a", "a").is_self_loop());
        assert!(!Edge::new("a", "b").is_self_loop());
    }
}
