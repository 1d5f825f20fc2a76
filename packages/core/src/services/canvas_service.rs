//! Canvas Service
//!
//! Async façade over one canvas. Owns the `CanvasState` behind a tokio
//! `RwLock` and wires it to the external collaborators:
//!
//! - Reads take the read lock and may run concurrently
//! - Every mutation goes through [`CanvasService::apply`] (or
//!   [`CanvasService::apply_batch`]) under the write lock, so there is exactly
//!   one writer per canvas and the staleness cascade runs inside it
//! - Collaborator calls (attachment upload, semantic search) run with no lock
//!   held and commit their result through the same write path. Dropping one
//!   of these futures before it commits leaves the canvas untouched
//!
//! Domain events from each committed mutation are broadcast after the lock is
//! released.

use super::canvas_state::{CanvasState, Mutation, MutationOutcome};
use super::context_assembly::GenerationContext;
use super::error::CanvasError;
use crate::config::EngineConfig;
use crate::events::CanvasEvent;
use crate::models::{Attachment, CanvasDocument, CanvasNode, NeuroSearchResult, NodeId};
use crate::store::{content_hash, AttachmentStore, Preflight, SemanticSearch, WorkspaceStore};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// What to do when an upload's name matches a different stored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Fail with `CanvasError::AttachmentConflict`
    #[default]
    Reject,
    /// Attach the new file and soft-delete the old one
    Replace,
}

/// Collaborators a canvas service talks to
#[derive(Clone)]
pub struct Collaborators {
    pub attachments: Arc<dyn AttachmentStore>,
    pub search: Arc<dyn SemanticSearch>,
    pub workspace: Arc<dyn WorkspaceStore>,
}

/// Serialized, event-emitting access to a single canvas
#[derive(Clone)]
pub struct CanvasService {
    canvas_id: String,
    state: Arc<RwLock<CanvasState>>,
    collaborators: Collaborators,
    event_tx: broadcast::Sender<CanvasEvent>,
}

impl CanvasService {
    /// Start with an empty canvas
    pub fn new(
        canvas_id: impl Into<String>,
        config: EngineConfig,
        collaborators: Collaborators,
    ) -> Self {
        Self::from_state(canvas_id.into(), CanvasState::new(config), collaborators)
    }

    /// Load a canvas through the workspace store and reconcile its flags
    pub async fn load(
        canvas_id: impl Into<String>,
        config: EngineConfig,
        collaborators: Collaborators,
    ) -> Result<Self, CanvasError> {
        let canvas_id = canvas_id.into();
        let document = collaborators
            .workspace
            .load(&canvas_id)
            .await
            .map_err(CanvasError::store)?;
        let state = CanvasState::from_document(document, config);
        Ok(Self::from_state(canvas_id, state, collaborators))
    }

    fn from_state(canvas_id: String, state: CanvasState, collaborators: Collaborators) -> Self {
        let (event_tx, _) = broadcast::channel(state.config().event_channel_capacity);
        Self {
            canvas_id,
            state: Arc::new(RwLock::new(state)),
            collaborators,
            event_tx,
        }
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    /// Persist the current document
    pub async fn save(&self) -> Result<(), CanvasError> {
        let document = self.snapshot().await;
        self.collaborators
            .workspace
            .save(&self.canvas_id, &document)
            .await
            .map_err(CanvasError::store)
    }

    /// Subscribe to domain events
    ///
    /// Receivers only see events sent after they subscribed.
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<CanvasEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors (no subscribers is normal)
    fn emit_events(&self, events: &[CanvasEvent]) {
        for event in events {
            let _ = self.event_tx.send(event.clone());
        }
    }

    //
    // WRITE PATH
    //

    /// Apply one mutation and broadcast its events
    pub async fn apply(&self, mutation: Mutation) -> Result<MutationOutcome, CanvasError> {
        let outcome = {
            let mut state = self.state.write().await;
            state.apply_mutation(mutation)?
        };
        self.emit_events(&outcome.events);
        Ok(outcome)
    }

    /// Apply several mutations atomically
    ///
    /// Either every mutation commits or, on the first error, none do.
    pub async fn apply_batch(
        &self,
        mutations: Vec<Mutation>,
    ) -> Result<Vec<MutationOutcome>, CanvasError> {
        let outcomes = {
            let mut state = self.state.write().await;
            let mut draft = state.clone();
            let mut outcomes = Vec::with_capacity(mutations.len());
            for mutation in mutations {
                outcomes.push(draft.apply_mutation(mutation)?);
            }
            *state = draft;
            outcomes
        };
        for outcome in &outcomes {
            self.emit_events(&outcome.events);
        }
        Ok(outcomes)
    }

    /// Upload a file and attach it to `node_id`
    pub async fn attach_file(
        &self,
        node_id: &str,
        name: &str,
        bytes: &[u8],
        policy: ConflictPolicy,
    ) -> Result<Attachment, CanvasError> {
        self.require_node(node_id).await?;
        let store = &self.collaborators.attachments;
        let file_hash = content_hash(bytes);

        let preflight = store
            .preflight(&self.canvas_id, name, &file_hash)
            .await
            .map_err(CanvasError::store)?;

        let (attachment, replaced) = match preflight {
            Preflight::AttachOnly {
                existing: Some(existing),
            } => (existing, None),
            Preflight::AttachOnly { existing: None } => {
                let stored = store
                    .put(&self.canvas_id, name, bytes)
                    .await
                    .map_err(CanvasError::store)?;
                (stored, None)
            }
            Preflight::Conflict { existing } => match policy {
                ConflictPolicy::Reject => {
                    return Err(CanvasError::attachment_conflict(
                        name,
                        existing.attachment_id,
                    ));
                }
                ConflictPolicy::Replace => {
                    let stored = store
                        .put(&self.canvas_id, name, bytes)
                        .await
                        .map_err(CanvasError::store)?;
                    (stored, Some(existing))
                }
            },
        };

        let mut mutations = Vec::new();
        if let Some(old) = &replaced {
            let node_has_old = self
                .node(node_id)
                .await
                .is_some_and(|n| n.attachments.iter().any(|a| a.attachment_id == old.attachment_id));
            if node_has_old {
                mutations.push(Mutation::RemoveAttachment {
                    node_id: node_id.to_string(),
                    attachment_id: old.attachment_id.clone(),
                });
            }
        }
        mutations.push(Mutation::AddAttachment {
            node_id: node_id.to_string(),
            attachment: attachment.clone(),
        });
        self.apply_batch(mutations).await?;

        if let Some(old) = replaced {
            self.release_attachment(&old.attachment_id).await?;
        }
        tracing::info!(
            "Attached {} ({}) to node {}",
            attachment.original_name,
            attachment.attachment_id,
            node_id
        );
        Ok(attachment)
    }

    /// Detach an attachment, then soft-delete its bytes if nothing else uses them
    pub async fn remove_attachment(
        &self,
        node_id: &str,
        attachment_id: &str,
    ) -> Result<MutationOutcome, CanvasError> {
        let outcome = self
            .apply(Mutation::RemoveAttachment {
                node_id: node_id.to_string(),
                attachment_id: attachment_id.to_string(),
            })
            .await?;
        self.release_attachment(attachment_id).await?;
        Ok(outcome)
    }

    async fn release_attachment(&self, attachment_id: &str) -> Result<(), CanvasError> {
        let still_used = {
            let state = self.state.read().await;
            let used = state
                .nodes()
                .any(|n| n.attachments.iter().any(|a| a.attachment_id == attachment_id));
            used
        };
        if still_used {
            tracing::debug!("Attachment {} still referenced, keeping bytes", attachment_id);
            return Ok(());
        }
        self.collaborators
            .attachments
            .soft_delete(&self.canvas_id, attachment_id)
            .await
            .map_err(CanvasError::store)
    }

    /// Search with the node's prompt and quote, filter, and commit the results
    ///
    /// Filtering runs against the graph as it is at commit time, so edges added
    /// while the search was in flight are respected.
    pub async fn run_neuro_search(&self, node_id: &str) -> Result<NeuroSearchResult, CanvasError> {
        let query = {
            let state = self.state.read().await;
            let node = state
                .node(node_id)
                .ok_or_else(|| CanvasError::node_not_found(node_id))?;
            match node.active_quote() {
                Some(quote) => format!("{}\n{}", node.prompt.trim(), quote),
                None => node.prompt.trim().to_string(),
            }
        };

        let candidates = self
            .collaborators
            .search
            .search(&self.canvas_id, &query)
            .await
            .map_err(CanvasError::store)?;

        let (result, outcome) = {
            let mut state = self.state.write().await;
            let result = state.filter_search_candidates(node_id, candidates);
            let outcome = state.apply_mutation(Mutation::SetNeuroSearchResults {
                node_id: node_id.to_string(),
                result: result.clone(),
            })?;
            (result, outcome)
        };
        self.emit_events(&outcome.events);

        tracing::info!(
            "Neuro-search for node {} committed {} results",
            node_id,
            result.candidates.len()
        );
        Ok(result)
    }

    /// Record a finished generation
    pub async fn commit_generation(
        &self,
        node_id: &str,
        response: impl Into<String>,
        context_hash: impl Into<String>,
    ) -> Result<MutationOutcome, CanvasError> {
        self.apply(Mutation::CommitGeneration {
            node_id: node_id.to_string(),
            response: response.into(),
            context_hash: context_hash.into(),
        })
        .await
    }

    //
    // READ PATH
    //

    async fn require_node(&self, node_id: &str) -> Result<(), CanvasError> {
        if self.state.read().await.node(node_id).is_none() {
            return Err(CanvasError::node_not_found(node_id));
        }
        Ok(())
    }

    pub async fn node(&self, node_id: &str) -> Option<CanvasNode> {
        self.state.read().await.node(node_id).cloned()
    }

    pub async fn snapshot(&self) -> CanvasDocument {
        self.state.read().await.to_document()
    }

    pub async fn is_stale(&self, node_id: &str) -> bool {
        self.state.read().await.is_stale(node_id)
    }

    pub async fn is_search_result_stale(&self, node_id: &str) -> bool {
        self.state.read().await.is_search_result_stale(node_id)
    }

    pub async fn compute_context_hash(&self, node_id: &str) -> String {
        self.state.read().await.compute_context_hash(node_id)
    }

    pub async fn assemble_context(&self, node_id: &str) -> Option<GenerationContext> {
        self.state.read().await.assemble_context(node_id)
    }

    pub async fn ancestors(&self, node_id: &str) -> HashSet<NodeId> {
        self.state.read().await.ancestors(node_id)
    }

    pub async fn descendants(&self, node_id: &str) -> HashSet<NodeId> {
        self.state.read().await.descendants(node_id)
    }
}
