//! Business Services
//!
//! The staleness engine and the services built on top of it:
//!
//! - `ContextHasher` - Deterministic fingerprint of a node's effective inputs
//! - `StalenessCascade` - Marks, heals and propagates `is_stale`
//! - `NeuroSearchFilter` - Lineage-aware filtering of semantic search hits
//! - `CanvasState` - Single serialized mutation entry point for a canvas
//! - `CanvasService` - Async façade wiring the state to external collaborators

pub mod canvas_service;
pub mod canvas_state;
pub mod context_assembly;
pub mod context_hasher;
pub mod error;
pub mod neuro_search;
pub mod staleness;

pub use canvas_service::{CanvasService, Collaborators, ConflictPolicy};
pub use canvas_state::{CanvasState, Mutation, MutationOutcome};
pub use context_assembly::{assemble_context, ContextExcerpt, GenerationContext};
pub use context_hasher::{attachment_signature, ContextHasher, ContextSelection, PART_SEPARATOR};
pub use error::CanvasError;
pub use neuro_search::{is_search_result_stale, NeuroSearchFilter};
pub use staleness::{CascadeReport, StaleTransition, StalenessCascade};
