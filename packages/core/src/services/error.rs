//! Service Layer Error Types
//!
//! Errors raised when a mutation or collaborator call cannot be applied. The
//! engine components themselves (index, lineage, hashing, cascade, filter)
//! are infallible; only requests that name unknown ids or fail at the
//! collaborator boundary end up here.

use thiserror::Error;

/// Canvas operation errors
#[derive(Error, Debug)]
pub enum CanvasError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// A node with this ID already exists
    #[error("Node already exists: {id}")]
    DuplicateNode { id: String },

    /// Edge from a node to itself
    #[error("Self-loop rejected on node {id}")]
    SelfLoop { id: String },

    /// Edge endpoint missing from the canvas
    #[error("Invalid edge {source_id} -> {target_id}: {reason}")]
    InvalidEdge {
        source_id: String,
        target_id: String,
        reason: String,
    },

    /// Reordering must keep the same parent set
    #[error("Parent order for node {id} does not match its parents")]
    ParentSetMismatch { id: String },

    /// Attachment not found on the node
    #[error("Attachment {attachment_id} not found on node {node_id}")]
    AttachmentNotFound {
        node_id: String,
        attachment_id: String,
    },

    /// A different file with the same name already exists
    #[error("Attachment '{name}' conflicts with existing attachment {existing_id}")]
    AttachmentConflict { name: String, existing_id: String },

    /// External collaborator (attachment store, search, persistence) failed
    #[error("Store operation failed: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CanvasError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a duplicate node error
    pub fn duplicate_node(id: impl Into<String>) -> Self {
        Self::DuplicateNode { id: id.into() }
    }

    /// Create a self-loop error
    pub fn self_loop(id: impl Into<String>) -> Self {
        Self::SelfLoop { id: id.into() }
    }

    /// Create an invalid edge error
    pub fn invalid_edge(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidEdge {
            source_id: source_id.into(),
            target_id: target_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a parent set mismatch error
    pub fn parent_set_mismatch(id: impl Into<String>) -> Self {
        Self::ParentSetMismatch { id: id.into() }
    }

    /// Create an attachment not found error
    pub fn attachment_not_found(node_id: impl Into<String>, attachment_id: impl Into<String>) -> Self {
        Self::AttachmentNotFound {
            node_id: node_id.into(),
            attachment_id: attachment_id.into(),
        }
    }

    /// Create an attachment conflict error
    pub fn attachment_conflict(name: impl Into<String>, existing_id: impl Into<String>) -> Self {
        Self::AttachmentConflict {
            name: name.into(),
            existing_id: existing_id.into(),
        }
    }

    /// Wrap a collaborator failure
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for CanvasError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
