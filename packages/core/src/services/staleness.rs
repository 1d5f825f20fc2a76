//! Staleness Cascade
//!
//! Decides whether each node's stored output still matches its inputs and
//! propagates transitions to children.
//!
//! # Rules
//!
//! - Only nodes with a `last_context_hash` (a committed generation) are tracked
//! - `is_stale = current_hash != last_context_hash`; this covers both marking
//!   and auto-heal (inputs returned to the generated state)
//! - Children are re-evaluated only when a node's flag actually flips, and each
//!   child is judged against its own fingerprint history
//! - A run with no flag changes touches nothing beyond the seeds, so repeated
//!   runs are fixed points
//!
//! The cascade is an explicit breadth-first worklist bounded by
//! `EngineConfig::max_traversal_steps`.

use super::context_hasher::ContextHasher;
use crate::config::EngineConfig;
use crate::graph::GraphIndex;
use crate::models::{CanvasNode, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// A node whose `is_stale` flag changed during a cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleTransition {
    pub node_id: NodeId,
    pub is_stale: bool,
}

/// What a cascade run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Nodes evaluated, in evaluation order
    pub evaluated: Vec<NodeId>,
    /// Flag flips, in evaluation order
    pub transitions: Vec<StaleTransition>,
    /// The step budget ran out before the worklist drained
    pub budget_exhausted: bool,
}

impl CascadeReport {
    pub fn is_noop(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn merge(&mut self, other: CascadeReport) {
        self.evaluated.extend(other.evaluated);
        self.transitions.extend(other.transitions);
        self.budget_exhausted |= other.budget_exhausted;
    }
}

/// Staleness evaluator over one index snapshot
#[derive(Debug, Clone, Copy)]
pub struct StalenessCascade<'a> {
    index: &'a GraphIndex,
    config: &'a EngineConfig,
}

impl<'a> StalenessCascade<'a> {
    pub fn new(index: &'a GraphIndex, config: &'a EngineConfig) -> Self {
        Self { index, config }
    }

    /// Whether `node` should currently be flagged stale
    pub fn expected_staleness(&self, nodes: &BTreeMap<NodeId, CanvasNode>, node_id: &str) -> bool {
        let Some(node) = nodes.get(node_id) else {
            return false;
        };
        match &node.last_context_hash {
            Some(last) => {
                let current =
                    ContextHasher::new(nodes, self.index, self.config).compute_context_hash(node_id);
                &current != last
            }
            None => false,
        }
    }

    /// Evaluate `seeds` and cascade any transitions through their descendants
    pub fn run(&self, nodes: &mut BTreeMap<NodeId, CanvasNode>, seeds: &[NodeId]) -> CascadeReport {
        let mut report = CascadeReport::default();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        let mut pending: HashSet<NodeId> = HashSet::new();

        for seed in seeds {
            if pending.insert(seed.clone()) {
                queue.push_back(seed.clone());
            }
        }

        let mut steps = 0usize;
        while let Some(node_id) = queue.pop_front() {
            pending.remove(&node_id);

            if steps >= self.config.max_traversal_steps {
                tracing::warn!(
                    "Staleness cascade exhausted {} steps with {} nodes still queued",
                    self.config.max_traversal_steps,
                    queue.len() + 1
                );
                report.budget_exhausted = true;
                break;
            }
            steps += 1;

            if !nodes.contains_key(&node_id) {
                tracing::debug!("Skipping cascade for missing node {}", node_id);
                continue;
            }

            let should_be_stale = self.expected_staleness(nodes, &node_id);
            report.evaluated.push(node_id.clone());

            let Some(node) = nodes.get_mut(&node_id) else {
                continue;
            };
            if node.is_stale == should_be_stale {
                continue;
            }

            node.is_stale = should_be_stale;
            tracing::debug!(
                "Node {} is now {}",
                node_id,
                if should_be_stale { "stale" } else { "fresh" }
            );
            report.transitions.push(StaleTransition {
                node_id: node_id.clone(),
                is_stale: should_be_stale,
            });

            for child in self.index.children_of(&node_id) {
                if pending.insert(child.clone()) {
                    queue.push_back(child.clone());
                }
            }
        }

        report
    }
}
