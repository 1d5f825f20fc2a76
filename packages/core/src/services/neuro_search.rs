//! Neuro-Search Candidate Filtering
//!
//! Post-processes ranked hits from the external semantic search. A node may
//! borrow context from unrelated parts of the canvas, but never from its own
//! lineage:
//!
//! - ancestors already reach the node through parent context
//! - descendants may hold conclusions the node must not see yet, and would
//!   create feedback loops
//!
//! Siblings and cousins stay eligible. The retained list is capped at
//! `EngineConfig::neuro_search_top_k` and snapshotted so later edits to the
//! borrowed sources can be detected.

use crate::config::EngineConfig;
use crate::graph::{GraphIndex, LineageWalker};
use crate::models::{CanvasNode, NeuroSearchResult, NodeId, SearchCandidate};
use std::collections::{BTreeMap, HashSet};

/// Lineage-aware filter over one canvas snapshot
#[derive(Debug, Clone, Copy)]
pub struct NeuroSearchFilter<'a> {
    nodes: &'a BTreeMap<NodeId, CanvasNode>,
    index: &'a GraphIndex,
    config: &'a EngineConfig,
}

impl<'a> NeuroSearchFilter<'a> {
    pub fn new(
        nodes: &'a BTreeMap<NodeId, CanvasNode>,
        index: &'a GraphIndex,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            nodes,
            index,
            config,
        }
    }

    /// Ids that may never appear in `node_id`'s search results
    pub fn excluded_ids(&self, node_id: &str) -> HashSet<NodeId> {
        let walker = LineageWalker::new(self.index, self.config.max_traversal_steps);
        let mut excluded = walker.lineage(node_id);
        excluded.extend(self.index.parents_of(node_id).iter().cloned());
        excluded.insert(node_id.to_string());
        excluded
    }

    /// Drop lineage, unknown and duplicate hits, keep the top-K, snapshot sources
    pub fn filter_candidates(
        &self,
        node_id: &str,
        candidates: Vec<SearchCandidate>,
    ) -> NeuroSearchResult {
        let excluded = self.excluded_ids(node_id);
        let total = candidates.len();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut result = NeuroSearchResult::default();

        for candidate in candidates {
            if result.candidates.len() >= self.config.neuro_search_top_k {
                break;
            }
            if excluded.contains(&candidate.node_id) {
                continue;
            }
            let Some(source) = self.nodes.get(&candidate.node_id) else {
                tracing::debug!(
                    "Search returned {} which is not on the canvas, skipping",
                    candidate.node_id
                );
                continue;
            };
            if !seen.insert(candidate.node_id.clone()) {
                continue;
            }

            result
                .source_snapshot
                .insert(candidate.node_id.clone(), source.updated_at);
            result.candidates.push(candidate);
        }

        tracing::debug!(
            "Neuro-search for {} kept {} of {} candidates",
            node_id,
            result.candidates.len(),
            total
        );
        result
    }
}

/// Whether any source borrowed by `node_id`'s last search changed since
///
/// A source that has been deleted counts as changed. Sources the user has
/// excluded from context are ignored.
pub fn is_search_result_stale(nodes: &BTreeMap<NodeId, CanvasNode>, node_id: &str) -> bool {
    let Some(node) = nodes.get(node_id) else {
        return false;
    };

    node.neuro_search_snapshot
        .iter()
        .filter(|(source_id, _)| !node.is_context_excluded(source_id))
        .any(|(source_id, snapshot_at)| match nodes.get(source_id) {
            Some(source) => source.updated_at > *snapshot_at,
            None => true,
        })
}
