//! Card Node Data Structures
//!
//! This module defines the `CanvasNode` struct: a single AI-generated card on a
//! canvas together with everything its generated output depends on.
//!
//! # Inputs vs. outputs
//!
//! - **Inputs** (fingerprinted): `prompt`, `quote`, parents, attachments,
//!   exclusion lists, `neuro_search_node_ids`
//! - **Outputs** (never fingerprinted for the node itself): `response`, `summary`
//! - **Bookkeeping**: `is_stale`, `last_context_hash`, timestamps
//!
//! A node's `summary`/`response` are *inputs of its children*.
//!
//! # Examples
//!
//! ```rust
//! use cardspace_core::models::CanvasNode;
//!
//! let root = CanvasNode::new("Explain the borrow checker".to_string());
//! let child = CanvasNode::new("Give an example".to_string())
//!     .with_parents(vec![root.id.clone()]);
//!
//! assert_eq!(child.parent_ids, vec![root.id.clone()]);
//! assert!(!child.has_generated_output());
//! ```

use super::attachment::{Attachment, AttachmentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of a node on the canvas
pub type NodeId = String;

/// Treats an explicit `null` the same as a missing list
fn deserialize_list_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A card on the canvas
///
/// Optional lists (`excluded_attachment_ids`, `excluded_context_node_ids`,
/// `neuro_search_node_ids`) are plain `Vec`s: a document that omits them, sets
/// them to `null` or sets them to `[]` all load to the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasNode {
    /// Unique identifier (UUID v4 for nodes created here)
    pub id: NodeId,

    /// User prompt
    #[serde(default)]
    pub prompt: String,

    /// Last generated output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Condensed form of `response`, preferred by children
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Excerpt quoted from a parent's response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,

    /// Set when the quoted source text no longer exists
    #[serde(default)]
    pub is_quote_invalidated: bool,

    /// Ordered parent ids
    #[serde(default, deserialize_with = "deserialize_list_or_null")]
    pub parent_ids: Vec<NodeId>,

    /// Legacy single-parent field from older documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,

    /// Ordered attachment metadata
    #[serde(default, deserialize_with = "deserialize_list_or_null")]
    pub attachments: Vec<Attachment>,

    #[serde(default, deserialize_with = "deserialize_list_or_null")]
    pub excluded_attachment_ids: Vec<AttachmentId>,

    /// Parents and neuro-search results the user switched off
    #[serde(default, deserialize_with = "deserialize_list_or_null")]
    pub excluded_context_node_ids: Vec<NodeId>,

    /// Node ids borrowed through the last committed semantic search
    #[serde(default, deserialize_with = "deserialize_list_or_null")]
    pub neuro_search_node_ids: Vec<NodeId>,

    /// `updated_at` of every borrowed source at search time
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub neuro_search_snapshot: BTreeMap<NodeId, DateTime<Utc>>,

    /// Stored output no longer matches the current inputs
    #[serde(default)]
    pub is_stale: bool,

    /// Context fingerprint recorded when `response` was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_context_hash: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl CanvasNode {
    /// Create an empty node with an auto-generated UUID
    pub fn new(prompt: String) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), prompt)
    }

    /// Create an empty node with a caller-provided id
    pub fn new_with_id(id: impl Into<NodeId>, prompt: String) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            prompt,
            response: None,
            summary: None,
            quote: None,
            is_quote_invalidated: false,
            parent_ids: Vec::new(),
            parent_id: None,
            attachments: Vec::new(),
            excluded_attachment_ids: Vec::new(),
            excluded_context_node_ids: Vec::new(),
            neuro_search_node_ids: Vec::new(),
            neuro_search_snapshot: BTreeMap::new(),
            is_stale: false,
            last_context_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_parents(mut self, parent_ids: Vec<NodeId>) -> Self {
        self.parent_ids = parent_ids;
        self
    }

    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = Some(quote.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Whether a generation has been committed for this node
    ///
    /// Only such nodes take part in staleness tracking.
    pub fn has_generated_output(&self) -> bool {
        self.last_context_hash.is_some()
    }

    /// The quote, if it still contributes to the context
    pub fn active_quote(&self) -> Option<&str> {
        match &self.quote {
            Some(quote) if !self.is_quote_invalidated && !quote.trim().is_empty() => {
                Some(quote.as_str())
            }
            _ => None,
        }
    }

    /// Text this node offers to its children: summary, else a response prefix
    pub fn context_excerpt(&self, fallback_chars: usize) -> Option<String> {
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(summary.to_string());
        }
        self.response
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(|r| r.chars().take(fallback_chars).collect())
    }

    pub fn is_context_excluded(&self, node_id: &str) -> bool {
        self.excluded_context_node_ids.iter().any(|id| id == node_id)
    }

    pub fn is_attachment_excluded(&self, attachment_id: &str) -> bool {
        self.excluded_attachment_ids
            .iter()
            .any(|id| id == attachment_id)
    }

    /// Parent ids named on the node itself, legacy field included
    pub fn declared_parent_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(self.parent_ids.len() + 1);
        for id in self.parent_ids.iter().chain(self.parent_id.iter()) {
            if !ids.contains(&id.as_str()) {
                ids.push(id.as_str());
            }
        }
        ids
    }
}
