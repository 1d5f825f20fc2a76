//! Cardspace Core: Context Dependency Graph & Staleness Engine
//!
//! Cards on a canvas depend on parent cards, an optional quote, file
//! attachments and the results of a semantic search. Generating a card's
//! response is expensive, so this crate tracks exactly what each response was
//! generated from and flags it stale only when those inputs really changed.
//! Reverting an edit heals the flag again.
//!
//! # Architecture
//!
//! - **Fingerprints**: every node's effective inputs hash to a blake3 digest
//! - **Uniform reconciliation**: every committed mutation re-evaluates the
//!   nodes whose inputs it touched and cascades flag flips to descendants
//! - **Single writer**: all mutations go through `CanvasState::apply_mutation`
//!
//! # Modules
//!
//! - [`models`] - Data structures (CanvasNode, Attachment, Edge, ...)
//! - [`graph`] - Parent/child index and bounded lineage traversal
//! - [`services`] - Hashing, staleness, search filtering, canvas state/service
//! - [`store`] - External collaborator traits and bundled implementations
//! - [`events`] - Domain events broadcast after committed mutations
//! - [`config`] - Engine tunables
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod events;
pub mod graph;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use config::EngineConfig;
pub use events::CanvasEvent;
pub use graph::{GraphIndex, LineageWalker};
pub use models::*;
pub use services::*;
