//! Parent/Child Adjacency Index
//!
//! Builds the structural view of a canvas from two sources:
//!
//! - the explicit `Edge` list maintained by the UI
//! - the `parent_ids` (and legacy `parent_id`) fields stored on each node
//!
//! # Merge rules
//!
//! - Every (parent, child) pair is linked at most once
//! - Self links and links to unknown nodes are dropped (logged)
//! - When a child has edges, edges are authoritative: declared parents without
//!   a backing edge are ignored
//! - When a child has no edges, its declared parents are used as-is
//! - Parent order follows the node's `parent_ids`, then edge-list order for
//!   parents only an edge names
//!
//! The index is a total function of its inputs and is rebuilt after every
//! graph mutation.

use crate::models::{CanvasNode, Edge, NodeId};
use std::collections::{HashMap, HashSet};

/// Adjacency maps for one snapshot of the canvas
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    parents_of: HashMap<NodeId, Vec<NodeId>>,
    children_of: HashMap<NodeId, Vec<NodeId>>,
    stats: IndexStats,
}

/// Counters collected while building the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Nodes indexed
    pub nodes: usize,
    /// Distinct parent → child links
    pub links: usize,
    /// Edges dropped as self links or with unknown endpoints
    pub dropped_edges: usize,
    /// Declared parent ids dropped (unknown, self, or overridden by edges)
    pub dropped_declared_parents: usize,
}

impl GraphIndex {
    /// Build the index from the current nodes and edges
    pub fn build<'a>(nodes: impl IntoIterator<Item = &'a CanvasNode>, edges: &[Edge]) -> Self {
        let nodes: Vec<&CanvasNode> = nodes.into_iter().collect();
        let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let mut stats = IndexStats {
            nodes: nodes.len(),
            ..IndexStats::default()
        };

        // Edge-derived parents per child, deduplicated, in edge-list order
        let mut edge_parents: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in edges {
            if edge.is_self_loop() {
                tracing::debug!("Dropping self-loop edge on node {}", edge.source);
                stats.dropped_edges += 1;
                continue;
            }
            if !known.contains(edge.source.as_str()) || !known.contains(edge.target.as_str()) {
                tracing::warn!(
                    "Dropping malformed edge {} -> {}: endpoint not on canvas",
                    edge.source,
                    edge.target
                );
                stats.dropped_edges += 1;
                continue;
            }
            let parents = edge_parents.entry(edge.target.as_str()).or_default();
            if !parents.contains(&edge.source.as_str()) {
                parents.push(edge.source.as_str());
            }
        }

        let mut parents_of: HashMap<NodeId, Vec<NodeId>> = HashMap::with_capacity(nodes.len());
        let mut children_of: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for node in &nodes {
            let mut declared: Vec<&str> = Vec::new();
            for id in node.declared_parent_ids() {
                if id == node.id || !known.contains(id) {
                    tracing::debug!("Ignoring declared parent {} of node {}", id, node.id);
                    stats.dropped_declared_parents += 1;
                    continue;
                }
                declared.push(id);
            }

            let parents: Vec<NodeId> = match edge_parents.get(node.id.as_str()) {
                Some(from_edges) => {
                    let mut merged: Vec<NodeId> = Vec::with_capacity(from_edges.len());
                    for id in &declared {
                        if from_edges.contains(id) {
                            merged.push((*id).to_string());
                        } else {
                            tracing::debug!(
                                "Declared parent {} of node {} has no edge, edges win",
                                id,
                                node.id
                            );
                            stats.dropped_declared_parents += 1;
                        }
                    }
                    for id in from_edges {
                        if !merged.iter().any(|m| m == id) {
                            merged.push((*id).to_string());
                        }
                    }
                    merged
                }
                None => declared.into_iter().map(str::to_string).collect(),
            };

            for parent in &parents {
                children_of
                    .entry(parent.clone())
                    .or_default()
                    .push(node.id.clone());
            }
            stats.links += parents.len();
            parents_of.insert(node.id.clone(), parents);
        }

        Self {
            parents_of,
            children_of,
            stats,
        }
    }

    /// Ordered parents of a node (empty for unknown ids)
    pub fn parents_of(&self, node_id: &str) -> &[NodeId] {
        self.parents_of
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Children of a node (empty for unknown ids)
    pub fn children_of(&self, node_id: &str) -> &[NodeId] {
        self.children_of
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.parents_of.contains_key(node_id)
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Every link as an `Edge`, grouped by child
    pub fn links(&self) -> Vec<Edge> {
        let mut links: Vec<Edge> = self
            .parents_of
            .iter()
            .flat_map(|(child, parents)| parents.iter().map(move |p| Edge::new(p, child)))
            .collect();
        links.sort_by(|a, b| (&a.target, &a.source).cmp(&(&b.target, &b.source)));
        links
    }
}
