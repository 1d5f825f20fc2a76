//! Domain Events for Canvas State
//!
//! Events describe committed changes to a canvas. `CanvasState` produces them
//! as part of a `MutationOutcome`; `CanvasService` broadcasts them so the UI
//! and the generation scheduler can react without polling.
//!
//! # Event Flow
//!
//! 1. A mutation is applied through `CanvasState::apply_mutation`
//! 2. The outcome lists structural events plus staleness transitions
//! 3. `CanvasService` sends each event on a tokio broadcast channel
//! 4. Subscribers receive them asynchronously

use crate::models::{Edge, NodeId};
use serde::{Deserialize, Serialize};

/// Domain events emitted after committed mutations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CanvasEvent {
    /// A node was added to the canvas
    NodeCreated { node_id: NodeId },

    /// One or more fields of a node changed
    NodeUpdated { node_id: NodeId },

    /// A node was removed together with its incident edges
    NodeDeleted { node_id: NodeId },

    /// A parent → child link was added
    EdgeCreated { edge: Edge },

    /// A parent → child link was removed
    EdgeDeleted { edge: Edge },

    /// The cascade flipped a node's `is_stale` flag
    StalenessChanged { node_id: NodeId, is_stale: bool },

    /// A neuro-search result set was committed
    SearchResultsUpdated { node_id: NodeId, result_count: usize },
}

impl CanvasEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            CanvasEvent::NodeCreated { .. } => "node:created",
            CanvasEvent::NodeUpdated { .. } => "node:updated",
            CanvasEvent::NodeDeleted { .. } => "node:deleted",
            CanvasEvent::EdgeCreated { .. } => "edge:created",
            CanvasEvent::EdgeDeleted { .. } => "edge:deleted",
            CanvasEvent::StalenessChanged { .. } => "node:staleness",
            CanvasEvent::SearchResultsUpdated { .. } => "node:search",
        }
    }

    /// The node an event is about (the child for edge events)
    pub fn node_id(&self) -> &str {
        match self {
            CanvasEvent::NodeCreated { node_id }
            | CanvasEvent::NodeUpdated { node_id }
            | CanvasEvent::NodeDeleted { node_id }
            | CanvasEvent::StalenessChanged { node_id, .. }
            | CanvasEvent::SearchResultsUpdated { node_id, .. } => node_id,
            CanvasEvent::EdgeCreated { edge } | CanvasEvent::EdgeDeleted { edge } => &edge.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: the frontend relies on this flat, internally-tagged shape
    #[test]
    fn test_staleness_event_serialization_contract() {
        let event = CanvasEvent::StalenessChanged {
            node_id: "n-1".to_string(),
            is_stale: true,
        };

        let parsed = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed.get("type").unwrap(), "stalenessChanged");
        assert_eq!(parsed.get("nodeId").unwrap(), "n-1");
        assert_eq!(parsed.get("isStale").unwrap(), true);
    }

    #[test]
    fn test_edge_event_nests_edge() {
        let event = CanvasEvent::EdgeCreated {
            edge: Edge::new("p", "c"),
        };

        let parsed = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed.get("type").unwrap(), "edgeCreated");
        assert_eq!(parsed["edge"]["source"], "p");
        assert_eq!(event.node_id(), "c");
        assert_eq!(event.event_type(), "edge:created");
    }
}
