//! Canvas State
//!
//! Owned, in-memory form of one canvas and the single entry point through
//! which it changes. Every mutation:
//!
//! 1. validates the ids it names
//! 2. applies the field change, skipping everything below when the node is
//!    left byte-identical (no cascade)
//! 3. rebuilds the `GraphIndex` when structure changed
//! 4. bumps `updated_at` only when the node's fingerprint input or the
//!    excerpt it lends to others changed
//! 5. runs the staleness cascade from the nodes whose inputs changed
//!
//! Children declared through `parent_ids` without edges get those edges
//! materialized on load and before an edge is added to them.
//!
//! Which nodes are seeded depends on what changed:
//!
//! - prompt, quote, attachments, exclusions, search results: the node itself
//! - summary or response: the node's children (it is their input)
//! - edge added or removed: the child
//! - node deleted: its former children
//! - generation committed: the node and its children

use super::context_assembly::{assemble_context, GenerationContext};
use super::context_hasher::ContextHasher;
use super::error::CanvasError;
use super::neuro_search::{is_search_result_stale, NeuroSearchFilter};
use super::staleness::{CascadeReport, StalenessCascade};
use crate::config::EngineConfig;
use crate::events::CanvasEvent;
use crate::graph::{GraphIndex, LineageWalker};
use crate::models::{
    Attachment, AttachmentId, CanvasDocument, CanvasNode, Edge, NeuroSearchResult, NodeId,
    SearchCandidate,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};

/// Every way the canvas can change
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateNode {
        node: CanvasNode,
    },
    DeleteNode {
        node_id: NodeId,
    },
    SetPrompt {
        node_id: NodeId,
        prompt: String,
    },
    /// Replace the quote; a new quote is always valid
    SetQuote {
        node_id: NodeId,
        quote: Option<String>,
    },
    InvalidateQuote {
        node_id: NodeId,
    },
    SetSummary {
        node_id: NodeId,
        summary: Option<String>,
    },
    /// Manual edit of a stored response (does not touch `last_context_hash`)
    SetResponse {
        node_id: NodeId,
        response: Option<String>,
    },
    /// Append an attachment, or replace the one with the same id in place
    AddAttachment {
        node_id: NodeId,
        attachment: Attachment,
    },
    RemoveAttachment {
        node_id: NodeId,
        attachment_id: AttachmentId,
    },
    SetAttachmentExcluded {
        node_id: NodeId,
        attachment_id: AttachmentId,
        excluded: bool,
    },
    /// Exclude or re-include a parent or a neuro-search result
    SetContextExcluded {
        node_id: NodeId,
        context_node_id: NodeId,
        excluded: bool,
    },
    /// Reorder a node's declared parents; the set must stay the same
    ReorderParents {
        node_id: NodeId,
        parent_ids: Vec<NodeId>,
    },
    /// Link parent → child; `position` places the parent in the child's
    /// `parent_ids` (appended when `None`)
    AddEdge {
        edge: Edge,
        position: Option<usize>,
    },
    RemoveEdge {
        edge: Edge,
    },
    SetNeuroSearchResults {
        node_id: NodeId,
        result: NeuroSearchResult,
    },
    /// Record a finished generation and the fingerprint it was produced from;
    /// the node stays stale when `context_hash` no longer matches its inputs
    CommitGeneration {
        node_id: NodeId,
        response: String,
        context_hash: String,
    },
    /// Re-run staleness evaluation without changing any field
    Reevaluate {
        node_id: NodeId,
    },
}

impl Mutation {
    /// Node the mutation is addressed to (the child for edge mutations)
    pub fn node_id(&self) -> &str {
        match self {
            Mutation::CreateNode { node } => &node.id,
            Mutation::AddEdge { edge, .. } | Mutation::RemoveEdge { edge } => &edge.target,
            Mutation::DeleteNode { node_id }
            | Mutation::SetPrompt { node_id, .. }
            | Mutation::SetQuote { node_id, .. }
            | Mutation::InvalidateQuote { node_id }
            | Mutation::SetSummary { node_id, .. }
            | Mutation::SetResponse { node_id, .. }
            | Mutation::AddAttachment { node_id, .. }
            | Mutation::RemoveAttachment { node_id, .. }
            | Mutation::SetAttachmentExcluded { node_id, .. }
            | Mutation::SetContextExcluded { node_id, .. }
            | Mutation::ReorderParents { node_id, .. }
            | Mutation::SetNeuroSearchResults { node_id, .. }
            | Mutation::CommitGeneration { node_id, .. }
            | Mutation::Reevaluate { node_id } => node_id,
        }
    }
}

/// What a mutation did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOutcome {
    /// Node the mutation was addressed to
    pub touched: NodeId,
    /// Whether any stored field changed
    pub changed: bool,
    /// Staleness evaluation triggered by the mutation
    pub cascade: CascadeReport,
    /// Events to publish, structural ones first
    pub events: Vec<CanvasEvent>,
}

impl MutationOutcome {
    fn unchanged(touched: NodeId) -> Self {
        Self {
            touched,
            ..Self::default()
        }
    }
}

/// In-memory canvas with a single mutation entry point
#[derive(Debug, Clone)]
pub struct CanvasState {
    nodes: BTreeMap<NodeId, CanvasNode>,
    edges: Vec<Edge>,
    index: GraphIndex,
    config: EngineConfig,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Insert or remove `value` so that membership equals `present`
fn set_membership(list: &mut Vec<String>, value: &str, present: bool) {
    let contained = list.iter().any(|v| v == value);
    if present && !contained {
        list.push(value.to_string());
    } else if !present && contained {
        list.retain(|v| v != value);
    }
}

impl CanvasState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            index: GraphIndex::default(),
            config,
        }
    }

    /// Load a persisted document and bring every staleness flag up to date
    ///
    /// Duplicate node ids keep the last occurrence.
    pub fn from_document(document: CanvasDocument, config: EngineConfig) -> Self {
        let mut nodes = BTreeMap::new();
        for node in document.nodes {
            if let Some(previous) = nodes.insert(node.id.clone(), node) {
                tracing::warn!("Duplicate node {} in canvas document, keeping last", previous.id);
            }
        }

        let mut state = Self {
            nodes,
            edges: document.edges,
            index: GraphIndex::default(),
            config,
        };
        let ids: Vec<NodeId> = state.nodes.keys().cloned().collect();
        let linked: usize = ids
            .iter()
            .map(|id| state.link_declared_parents(id).len())
            .sum();
        if linked > 0 {
            tracing::info!("Created {} edges for parents declared only on nodes", linked);
        }
        state.rebuild_index();
        let report = state.reconcile_all();
        tracing::info!(
            "Loaded canvas with {} nodes, {} links ({} stale transitions on load)",
            state.nodes.len(),
            state.index.stats().links,
            report.transitions.len()
        );
        state
    }

    pub fn to_document(&self) -> CanvasDocument {
        CanvasDocument {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.clone(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn node(&self, node_id: &str) -> Option<&CanvasNode> {
        self.nodes.get(node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CanvasNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // Read-side queries

    pub fn is_stale(&self, node_id: &str) -> bool {
        self.nodes.get(node_id).is_some_and(|n| n.is_stale)
    }

    pub fn is_search_result_stale(&self, node_id: &str) -> bool {
        is_search_result_stale(&self.nodes, node_id)
    }

    pub fn compute_context_hash(&self, node_id: &str) -> String {
        self.hasher().compute_context_hash(node_id)
    }

    pub fn ancestors(&self, node_id: &str) -> HashSet<NodeId> {
        self.walker().ancestors(node_id)
    }

    pub fn descendants(&self, node_id: &str) -> HashSet<NodeId> {
        self.walker().descendants(node_id)
    }

    pub fn filter_search_candidates(
        &self,
        node_id: &str,
        candidates: Vec<SearchCandidate>,
    ) -> NeuroSearchResult {
        NeuroSearchFilter::new(&self.nodes, &self.index, &self.config)
            .filter_candidates(node_id, candidates)
    }

    pub fn assemble_context(&self, node_id: &str) -> Option<GenerationContext> {
        assemble_context(&self.nodes, &self.hasher(), &self.config, node_id)
    }

    fn hasher(&self) -> ContextHasher<'_> {
        ContextHasher::new(&self.nodes, &self.index, &self.config)
    }

    fn walker(&self) -> LineageWalker<'_> {
        LineageWalker::new(&self.index, self.config.max_traversal_steps)
    }

    // Write-side entry points

    /// Re-run staleness evaluation for a node (and cascade from it)
    pub fn on_input_mutated(&mut self, node_id: &str) -> Result<MutationOutcome, CanvasError> {
        self.apply_mutation(Mutation::Reevaluate {
            node_id: node_id.to_string(),
        })
    }

    /// Record a finished generation for a node
    ///
    /// Stores the response and `context_hash`, then re-evaluates the node.
    /// The stale flag clears when `context_hash` matches the node's current
    /// inputs. A hash taken before inputs were edited mid-generation leaves
    /// the node stale, since its response no longer reflects them.
    pub fn commit_generation(
        &mut self,
        node_id: &str,
        response: impl Into<String>,
        context_hash: impl Into<String>,
    ) -> Result<MutationOutcome, CanvasError> {
        self.apply_mutation(Mutation::CommitGeneration {
            node_id: node_id.to_string(),
            response: response.into(),
            context_hash: context_hash.into(),
        })
    }

    /// Evaluate every node; used after loading a document
    pub fn reconcile_all(&mut self) -> CascadeReport {
        let seeds: Vec<NodeId> = self.nodes.keys().cloned().collect();
        let config = self.config.clone().with_max_traversal_steps(
            self.config.max_traversal_steps.max(seeds.len() * 2),
        );
        StalenessCascade::new(&self.index, &config).run(&mut self.nodes, &seeds)
    }

    /// Apply one mutation; the only way canvas contents change
    pub fn apply_mutation(&mut self, mutation: Mutation) -> Result<MutationOutcome, CanvasError> {
        let touched = mutation.node_id().to_string();
        let signature_before = self.content_signature(&touched);
        let mut events: Vec<CanvasEvent> = Vec::new();

        let seeds: Vec<NodeId> = match mutation {
            Mutation::CreateNode { mut node } => {
                if self.nodes.contains_key(&node.id) {
                    return Err(CanvasError::duplicate_node(&node.id));
                }
                let node_id = node.id.clone();
                node.parent_ids.retain(|p| p != &node_id);
                node.parent_ids.dedup();

                // Keep edges consistent with declared parents that exist
                for parent_id in node.declared_parent_ids() {
                    if !self.nodes.contains_key(parent_id) {
                        tracing::warn!(
                            "New node {} names unknown parent {}, no edge created",
                            node_id,
                            parent_id
                        );
                        continue;
                    }
                    let edge = Edge::new(parent_id, &node_id);
                    if !self.edges.contains(&edge) {
                        self.edges.push(edge.clone());
                        events.push(CanvasEvent::EdgeCreated { edge });
                    }
                }

                events.insert(
                    0,
                    CanvasEvent::NodeCreated {
                        node_id: node_id.clone(),
                    },
                );
                self.nodes.insert(node_id.clone(), node);
                self.rebuild_index();
                vec![node_id]
            }

            Mutation::DeleteNode { node_id } => {
                if !self.nodes.contains_key(&node_id) {
                    return Err(CanvasError::node_not_found(&node_id));
                }
                let orphans: Vec<NodeId> = self.index.children_of(&node_id).to_vec();
                self.nodes.remove(&node_id);

                let (removed, kept): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
                    .into_iter()
                    .partition(|e| e.source == node_id || e.target == node_id);
                self.edges = kept;

                let now = Utc::now();
                for node in self.nodes.values_mut() {
                    let before = node.parent_ids.len();
                    node.parent_ids.retain(|p| p != &node_id);
                    let mut stripped = node.parent_ids.len() != before;
                    if node.parent_id.as_deref() == Some(node_id.as_str()) {
                        node.parent_id = None;
                        stripped = true;
                    }
                    if stripped {
                        node.updated_at = now;
                        events.push(CanvasEvent::NodeUpdated {
                            node_id: node.id.clone(),
                        });
                    }
                }

                events.insert(
                    0,
                    CanvasEvent::NodeDeleted {
                        node_id: node_id.clone(),
                    },
                );
                for edge in removed {
                    events.push(CanvasEvent::EdgeDeleted { edge });
                }
                self.rebuild_index();
                orphans
            }

            Mutation::SetPrompt { node_id, prompt } => {
                if !self.edit_node(&node_id, |n| n.prompt = prompt)? {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                vec![node_id]
            }

            Mutation::SetQuote { node_id, quote } => {
                let changed = self.edit_node(&node_id, |n| {
                    n.quote = quote;
                    n.is_quote_invalidated = false;
                })?;
                if !changed {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                vec![node_id]
            }

            Mutation::InvalidateQuote { node_id } => {
                if !self.edit_node(&node_id, |n| n.is_quote_invalidated = true)? {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                vec![node_id]
            }

            Mutation::SetSummary { node_id, summary } => {
                if !self.edit_node(&node_id, |n| n.summary = summary)? {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                self.index.children_of(&node_id).to_vec()
            }

            Mutation::SetResponse { node_id, response } => {
                if !self.edit_node(&node_id, |n| n.response = response)? {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                self.index.children_of(&node_id).to_vec()
            }

            Mutation::AddAttachment {
                node_id,
                attachment,
            } => {
                let changed = self.edit_node(&node_id, |n| {
                    match n
                        .attachments
                        .iter_mut()
                        .find(|a| a.attachment_id == attachment.attachment_id)
                    {
                        Some(existing) => *existing = attachment,
                        None => n.attachments.push(attachment),
                    }
                })?;
                if !changed {
                    tracing::debug!("Attachment on node {} unchanged, skipping cascade", node_id);
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                vec![node_id]
            }

            Mutation::RemoveAttachment {
                node_id,
                attachment_id,
            } => {
                let node = self
                    .nodes
                    .get(&node_id)
                    .ok_or_else(|| CanvasError::node_not_found(&node_id))?;
                if !node
                    .attachments
                    .iter()
                    .any(|a| a.attachment_id == attachment_id)
                {
                    return Err(CanvasError::attachment_not_found(&node_id, &attachment_id));
                }
                self.edit_node(&node_id, |n| {
                    n.attachments.retain(|a| a.attachment_id != attachment_id)
                })?;
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                vec![node_id]
            }

            Mutation::SetAttachmentExcluded {
                node_id,
                attachment_id,
                excluded,
            } => {
                let changed = self.edit_node(&node_id, |n| {
                    set_membership(&mut n.excluded_attachment_ids, &attachment_id, excluded)
                })?;
                if !changed {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                vec![node_id]
            }

            Mutation::SetContextExcluded {
                node_id,
                context_node_id,
                excluded,
            } => {
                let changed = self.edit_node(&node_id, |n| {
                    set_membership(&mut n.excluded_context_node_ids, &context_node_id, excluded)
                })?;
                if !changed {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                vec![node_id]
            }

            Mutation::ReorderParents {
                node_id,
                parent_ids,
            } => {
                let node = self
                    .nodes
                    .get(&node_id)
                    .ok_or_else(|| CanvasError::node_not_found(&node_id))?;
                let current: HashSet<&NodeId> = node.parent_ids.iter().collect();
                let proposed: HashSet<&NodeId> = parent_ids.iter().collect();
                if current != proposed || proposed.len() != parent_ids.len() {
                    return Err(CanvasError::parent_set_mismatch(&node_id));
                }
                if !self.edit_node(&node_id, |n| n.parent_ids = parent_ids)? {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                self.rebuild_index();
                vec![node_id]
            }

            Mutation::AddEdge { edge, position } => {
                if edge.is_self_loop() {
                    return Err(CanvasError::self_loop(&edge.source));
                }
                if !self.nodes.contains_key(&edge.source) {
                    return Err(CanvasError::invalid_edge(
                        &edge.source,
                        &edge.target,
                        "source not on canvas",
                    ));
                }
                if !self.nodes.contains_key(&edge.target) {
                    return Err(CanvasError::invalid_edge(
                        &edge.source,
                        &edge.target,
                        "target not on canvas",
                    ));
                }

                // Parents declared without edges would otherwise lose to this edge
                for linked in self.link_declared_parents(&edge.target) {
                    events.push(CanvasEvent::EdgeCreated { edge: linked });
                }

                let edge_added = !self.edges.contains(&edge);
                let parent_added = self.edit_node(&edge.target, |n| {
                    if !n.parent_ids.contains(&edge.source) {
                        let at = position.unwrap_or(n.parent_ids.len()).min(n.parent_ids.len());
                        n.parent_ids.insert(at, edge.source.clone());
                    }
                })?;
                if !edge_added && !parent_added && events.is_empty() {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                if edge_added {
                    self.edges.push(edge.clone());
                    events.push(CanvasEvent::EdgeCreated { edge: edge.clone() });
                }
                if parent_added {
                    events.push(CanvasEvent::NodeUpdated {
                        node_id: edge.target.clone(),
                    });
                }
                self.rebuild_index();
                vec![edge.target]
            }

            Mutation::RemoveEdge { edge } => {
                if !self.nodes.contains_key(&edge.target) {
                    return Err(CanvasError::node_not_found(&edge.target));
                }
                let edges_before = self.edges.len();
                self.edges.retain(|e| e != &edge);
                let edge_removed = self.edges.len() != edges_before;

                let parent_removed = self.edit_node(&edge.target, |n| {
                    n.parent_ids.retain(|p| p != &edge.source);
                    if n.parent_id.as_deref() == Some(edge.source.as_str()) {
                        n.parent_id = None;
                    }
                })?;
                if !edge_removed && !parent_removed {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                if edge_removed {
                    events.push(CanvasEvent::EdgeDeleted { edge: edge.clone() });
                }
                if parent_removed {
                    events.push(CanvasEvent::NodeUpdated {
                        node_id: edge.target.clone(),
                    });
                }
                self.rebuild_index();
                vec![edge.target]
            }

            Mutation::SetNeuroSearchResults { node_id, result } => {
                let result_count = result.candidates.len();
                let changed = self.edit_node(&node_id, |n| {
                    n.neuro_search_node_ids = result.node_ids();
                    n.neuro_search_snapshot = result.source_snapshot;
                })?;
                if !changed {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                events.push(CanvasEvent::SearchResultsUpdated {
                    node_id: node_id.clone(),
                    result_count,
                });
                vec![node_id]
            }

            Mutation::CommitGeneration {
                node_id,
                response,
                context_hash,
            } => {
                let changed = self.edit_node(&node_id, |n| {
                    n.response = Some(response);
                    n.last_context_hash = Some(context_hash);
                })?;
                if !changed {
                    return Ok(MutationOutcome::unchanged(touched));
                }
                tracing::info!("Committed generation for node {}", node_id);
                events.push(CanvasEvent::NodeUpdated {
                    node_id: node_id.clone(),
                });
                let mut seeds = vec![node_id.clone()];
                seeds.extend(self.index.children_of(&node_id).iter().cloned());
                seeds
            }

            Mutation::Reevaluate { node_id } => {
                if !self.nodes.contains_key(&node_id) {
                    return Err(CanvasError::node_not_found(&node_id));
                }
                vec![node_id]
            }
        };

        let changed = !events.is_empty();
        if changed {
            self.touch_if_content_changed(&touched, signature_before);
        }
        let cascade =
            StalenessCascade::new(&self.index, &self.config).run(&mut self.nodes, &seeds);
        events.extend(cascade.transitions.iter().map(|t| CanvasEvent::StalenessChanged {
            node_id: t.node_id.clone(),
            is_stale: t.is_stale,
        }));

        Ok(MutationOutcome {
            touched,
            changed,
            cascade,
            events,
        })
    }

    /// Apply `edit` to a node; reports whether any field changed
    fn edit_node<F>(&mut self, node_id: &str, edit: F) -> Result<bool, CanvasError>
    where
        F: FnOnce(&mut CanvasNode),
    {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| CanvasError::node_not_found(node_id))?;
        let before = node.clone();
        edit(node);
        Ok(*node != before)
    }

    /// What depends on a node: its own fingerprint input and the excerpt it
    /// offers to children and search borrowers
    fn content_signature(&self, node_id: &str) -> Option<(String, Option<String>)> {
        let node = self.nodes.get(node_id)?;
        Some((
            self.hasher().fingerprint_source(node_id),
            node.context_excerpt(self.config.response_fallback_chars),
        ))
    }

    /// Bump `updated_at` only when the edit changed what depends on the node
    fn touch_if_content_changed(
        &mut self,
        node_id: &str,
        before: Option<(String, Option<String>)>,
    ) {
        // Created or deleted by this mutation
        let (Some(before), Some(after)) = (before, self.content_signature(node_id)) else {
            return;
        };
        if before == after {
            tracing::debug!("Node {} edited without content change, keeping updated_at", node_id);
            return;
        }
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.updated_at = Utc::now();
        }
    }

    /// Create edges for the declared parents of a node that has no edges yet
    ///
    /// Returns the edges created.
    fn link_declared_parents(&mut self, node_id: &str) -> Vec<Edge> {
        if self.edges.iter().any(|e| e.target == node_id) {
            return Vec::new();
        }
        let Some(node) = self.nodes.get(node_id) else {
            return Vec::new();
        };
        let linked: Vec<Edge> = node
            .declared_parent_ids()
            .into_iter()
            .filter(|p| *p != node_id && self.nodes.contains_key(*p))
            .map(|p| Edge::new(p, node_id))
            .collect();
        self.edges.extend(linked.iter().cloned());
        linked
    }

    fn rebuild_index(&mut self) {
        self.index = GraphIndex::build(self.nodes.values(), &self.edges);
    }
}
