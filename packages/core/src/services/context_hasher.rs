//! Context Fingerprints
//!
//! Computes a deterministic fingerprint over everything a node's generated
//! output depends on. The fingerprint is order sensitive and never looks at
//! the node's own `response`.
//!
//! # Fingerprint layout
//!
//! Parts are appended in this order and joined with `PART_SEPARATOR`:
//!
//! 1. trimmed prompt
//! 2. quote, unless invalidated
//! 3. per active parent (in parent order): summary, else a response prefix
//! 4. per active attachment (in attachment order): its signature
//! 5. per active neuro-search result: its node id
//!
//! The joined text is digested with blake3 so fingerprints stay short enough
//! to persist on every node.

use crate::config::EngineConfig;
use crate::graph::GraphIndex;
use crate::models::{Attachment, AttachmentKind, CanvasNode, IngestionMode, NodeId};
use chrono::SecondsFormat;
use std::collections::BTreeMap;

/// Separator between fingerprint parts (ASCII unit separator)
pub const PART_SEPARATOR: &str = "\u{1f}";

/// The inputs of one node that survive exclusion filtering
#[derive(Debug, Clone)]
pub struct ContextSelection<'a> {
    pub node: &'a CanvasNode,
    /// Active parents that still exist, in parent order
    pub parents: Vec<&'a CanvasNode>,
    /// Active attachments, in attachment order
    pub attachments: Vec<&'a Attachment>,
    /// Active neuro-search ids, in result order (may name deleted nodes)
    pub neuro_search_ids: Vec<&'a str>,
}

/// Fingerprint calculator over one canvas snapshot
#[derive(Debug, Clone, Copy)]
pub struct ContextHasher<'a> {
    nodes: &'a BTreeMap<NodeId, CanvasNode>,
    index: &'a GraphIndex,
    config: &'a EngineConfig,
}

impl<'a> ContextHasher<'a> {
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

    /// Select the inputs of `node_id` that currently contribute to its context
    ///
    /// Returns `None` for unknown nodes.
    pub fn select(&self, node_id: &str) -> Option<ContextSelection<'a>> {
        let node = self.nodes.get(node_id)?;

        let mut parents = Vec::new();
        for parent_id in self.index.parents_of(node_id) {
            if node.is_context_excluded(parent_id) {
                continue;
            }
            match self.nodes.get(parent_id) {
                Some(parent) => parents.push(parent),
                None => tracing::debug!(
                    "Parent {} of node {} no longer exists, treating as absent",
                    parent_id,
                    node_id
                ),
            }
        }

        let attachments = node
            .attachments
            .iter()
            .filter(|a| !node.is_attachment_excluded(&a.attachment_id))
            .collect();

        let neuro_search_ids = node
            .neuro_search_node_ids
            .iter()
            .filter(|id| !node.is_context_excluded(id))
            .map(String::as_str)
            .collect();

        Some(ContextSelection {
            node,
            parents,
            attachments,
            neuro_search_ids,
        })
    }

    /// Un-digested fingerprint text for `node_id`
    ///
    /// Unknown nodes produce the empty string.
    pub fn fingerprint_source(&self, node_id: &str) -> String {
        let Some(selection) = self.select(node_id) else {
            tracing::debug!("Fingerprint requested for unknown node {}", node_id);
            return String::new();
        };

        let mut parts: Vec<String> = Vec::new();
        parts.push(format!("prompt:{}", selection.node.prompt.trim()));

        if let Some(quote) = selection.node.active_quote() {
            parts.push(format!("quote:{}", quote));
        }

        for parent in &selection.parents {
            if let Some(excerpt) = parent.context_excerpt(self.config.response_fallback_chars) {
                parts.push(format!("parent:{}", excerpt));
            }
        }

        for attachment in &selection.attachments {
            match attachment_signature(attachment) {
                Some(signature) => parts.push(format!("attachment:{}", signature)),
                None => tracing::debug!(
                    "Attachment {} on node {} has no content hash yet, omitted from fingerprint",
                    attachment.attachment_id,
                    node_id
                ),
            }
        }

        for id in &selection.neuro_search_ids {
            parts.push(format!("neuro:{}", id));
        }

        parts.join(PART_SEPARATOR)
    }

    /// Deterministic fingerprint of the current input context of `node_id`
    pub fn compute_context_hash(&self, node_id: &str) -> String {
        let source = self.fingerprint_source(node_id);
        blake3::hash(source.as_bytes()).to_hex().to_string()
    }
}

/// Compact signature of the attachment fields the context depends on
///
/// Returns `None` while the store has not reported a content hash.
pub fn attachment_signature(attachment: &Attachment) -> Option<String> {
    if !attachment.has_content_hash() {
        return None;
    }

    let kind = match attachment.kind {
        AttachmentKind::Image => "image",
        AttachmentKind::Text => match attachment.ingestion_mode {
            IngestionMode::Inline => "text-inline",
            IngestionMode::Chunked => "text-chunked",
        },
    };

    Some(format!(
        "{}|{}|{}|{}|{}|{}",
        kind,
        attachment.attachment_id,
        attachment.mime,
        attachment.size_bytes,
        attachment.file_hash,
        attachment
            .file_updated_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    ))
}
