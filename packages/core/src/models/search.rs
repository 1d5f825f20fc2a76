//! Semantic Search Results
//!
//! Candidates come ranked from the external search collaborator; the engine
//! filters them and remembers when each retained source was last updated.

use super::node::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCandidate {
    pub node_id: NodeId,
    pub score: f64,
}

impl SearchCandidate {
    pub fn new(node_id: impl Into<NodeId>, score: f64) -> Self {
        Self {
            node_id: node_id.into(),
            score,
        }
    }
}

/// Filtered candidates plus the point-in-time snapshot of their sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeuroSearchResult {
    pub candidates: Vec<SearchCandidate>,
    pub source_snapshot: BTreeMap<NodeId, DateTime<Utc>>,
}

impl NeuroSearchResult {
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.candidates.iter().map(|c| c.node_id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
