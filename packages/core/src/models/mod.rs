//! Data Models
//!
//! This module contains the data structures the engine operates on:
//!
//! - `CanvasNode` - A card with its inputs, outputs and staleness bookkeeping
//! - `Attachment` - File metadata (bytes live in the attachment store)
//! - `Edge` / `CanvasDocument` - Graph structure and its persisted form
//! - `SearchCandidate` / `NeuroSearchResult` - Semantic search hits

mod attachment;
mod canvas;
mod node;
mod search;

pub use attachment::{Attachment, AttachmentId, AttachmentKind, IngestionMode};
pub use canvas::{CanvasDocument, Edge};
pub use node::{CanvasNode, NodeId};
pub use search::{NeuroSearchResult, SearchCandidate};
