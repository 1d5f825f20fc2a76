//! External Collaborators
//!
//! Traits for the work the engine delegates: storing attachment bytes,
//! ranking semantically similar cards, and persisting the canvas document.
//! All methods are async and return `anyhow::Result`; `CanvasService` maps
//! failures into `CanvasError::Store`.
//!
//! Implementations must be `Send + Sync` so futures holding them can move
//! between threads.
//!
//! Bundled implementations:
//!
//! - [`MemoryAttachmentStore`] - content-addressed bytes with a trash area
//! - [`StaticSearch`] - fixed ranked list, for tests and offline hosts
//! - [`JsonFileWorkspaceStore`] - one JSON document per canvas on disk

mod json_file;
mod memory;

pub use json_file::JsonFileWorkspaceStore;
pub use memory::{MemoryAttachmentStore, StaticSearch};

use crate::models::{Attachment, CanvasDocument, SearchCandidate};
use anyhow::Result;
use async_trait::async_trait;

/// Result of checking an upload against what the canvas already holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preflight {
    /// Safe to attach. `existing` is set when identical bytes are already
    /// stored, in which case that attachment is reused as-is.
    AttachOnly { existing: Option<Attachment> },
    /// A different file with the same name is already stored
    Conflict { existing: Attachment },
}

/// Byte-level attachment storage
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store `bytes` under `name`; identical bytes return the stored attachment
    async fn put(&self, canvas_id: &str, name: &str, bytes: &[u8]) -> Result<Attachment>;

    /// Fetch stored bytes
    async fn get(&self, canvas_id: &str, attachment_id: &str) -> Result<Vec<u8>>;

    /// Move an attachment to the recoverable trash area
    ///
    /// Idempotent: deleting an already trashed or unknown id succeeds.
    async fn soft_delete(&self, canvas_id: &str, attachment_id: &str) -> Result<()>;

    /// Check whether an upload of `name` with content hash `file_hash` can proceed
    async fn preflight(&self, canvas_id: &str, name: &str, file_hash: &str) -> Result<Preflight>;
}

/// Ranked semantic search over a canvas
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Candidates ordered best-first; unfiltered
    async fn search(&self, canvas_id: &str, query: &str) -> Result<Vec<SearchCandidate>>;
}

/// Canvas document persistence
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Load a canvas; a canvas that was never saved loads as empty
    async fn load(&self, canvas_id: &str) -> Result<CanvasDocument>;

    async fn save(&self, canvas_id: &str, document: &CanvasDocument) -> Result<()>;
}

/// Content hash used for attachment addressing
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
