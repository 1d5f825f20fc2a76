//! In-memory collaborators

use super::{content_hash, AttachmentStore, Preflight, SemanticSearch};
use crate::models::{Attachment, AttachmentKind, IngestionMode, SearchCandidate};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Text files larger than this are retrieved in chunks rather than inlined
pub const CHUNKED_INGESTION_THRESHOLD: u64 = 32 * 1024;

#[derive(Debug, Clone)]
struct StoredFile {
    attachment: Attachment,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct CanvasFiles {
    live: HashMap<String, StoredFile>,
    trash: HashMap<String, StoredFile>,
}

/// Attachment store keeping bytes in memory, addressed by blake3 hash
#[derive(Debug, Default)]
pub struct MemoryAttachmentStore {
    canvases: RwLock<HashMap<String, CanvasFiles>>,
}

/// Guess the MIME type from the file extension
fn guess_mime(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "md" | "markdown" => "text/markdown",
        "json" => "application/json",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        _ => "text/plain",
    }
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring a soft-deleted attachment back
    pub async fn restore(&self, canvas_id: &str, attachment_id: &str) -> Result<Attachment> {
        let mut canvases = self.canvases.write().await;
        let files = canvases
            .get_mut(canvas_id)
            .ok_or_else(|| anyhow!("Unknown canvas: {}", canvas_id))?;
        let stored = files
            .trash
            .remove(attachment_id)
            .ok_or_else(|| anyhow!("Attachment {} is not in the trash", attachment_id))?;
        let attachment = stored.attachment.clone();
        files.live.insert(attachment_id.to_string(), stored);
        Ok(attachment)
    }

    /// Ids currently in the trash area of a canvas
    pub async fn trashed_ids(&self, canvas_id: &str) -> Vec<String> {
        let canvases = self.canvases.read().await;
        let mut ids: Vec<String> = canvases
            .get(canvas_id)
            .map(|files| files.trash.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn put(&self, canvas_id: &str, name: &str, bytes: &[u8]) -> Result<Attachment> {
        let file_hash = content_hash(bytes);
        let mut canvases = self.canvases.write().await;
        let files = canvases.entry(canvas_id.to_string()).or_default();

        if let Some(stored) = files
            .live
            .values()
            .find(|f| f.attachment.file_hash == file_hash)
        {
            tracing::debug!("Reusing stored attachment {} for {}", stored.attachment.attachment_id, name);
            return Ok(stored.attachment.clone());
        }

        // Identical bytes removed earlier come back under their original metadata
        let trashed_id = files
            .trash
            .iter()
            .find(|(_, f)| f.attachment.file_hash == file_hash)
            .map(|(id, _)| id.clone());
        if let Some(stored) = trashed_id.and_then(|id| files.trash.remove(&id)) {
            let attachment = stored.attachment.clone();
            tracing::debug!("Restored attachment {} from trash for {}", attachment.attachment_id, name);
            files.live.insert(attachment.attachment_id.clone(), stored);
            return Ok(attachment);
        }

        let mime = guess_mime(name);
        let kind = if mime.starts_with("image/") {
            AttachmentKind::Image
        } else {
            AttachmentKind::Text
        };
        let size_bytes = bytes.len() as u64;
        let ingestion_mode = match kind {
            AttachmentKind::Text if size_bytes > CHUNKED_INGESTION_THRESHOLD => {
                IngestionMode::Chunked
            }
            _ => IngestionMode::Inline,
        };

        let attachment = Attachment {
            attachment_id: format!("att-{}", &file_hash[..16]),
            kind,
            original_name: name.to_string(),
            mime: mime.to_string(),
            size_bytes,
            file_hash,
            file_updated_at: Utc::now(),
            ingestion_mode,
        };
        files.trash.remove(&attachment.attachment_id);
        files.live.insert(
            attachment.attachment_id.clone(),
            StoredFile {
                attachment: attachment.clone(),
                bytes: bytes.to_vec(),
            },
        );
        tracing::debug!("Stored attachment {} ({} bytes)", attachment.attachment_id, size_bytes);
        Ok(attachment)
    }

    async fn get(&self, canvas_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let canvases = self.canvases.read().await;
        canvases
            .get(canvas_id)
            .and_then(|files| files.live.get(attachment_id))
            .map(|f| f.bytes.clone())
            .ok_or_else(|| anyhow!("Attachment {} not found in canvas {}", attachment_id, canvas_id))
    }

    async fn soft_delete(&self, canvas_id: &str, attachment_id: &str) -> Result<()> {
        let mut canvases = self.canvases.write().await;
        if let Some(files) = canvases.get_mut(canvas_id) {
            if let Some(stored) = files.live.remove(attachment_id) {
                files.trash.insert(attachment_id.to_string(), stored);
            }
        }
        Ok(())
    }

    async fn preflight(&self, canvas_id: &str, name: &str, file_hash: &str) -> Result<Preflight> {
        let canvases = self.canvases.read().await;
        let Some(files) = canvases.get(canvas_id) else {
            return Ok(Preflight::AttachOnly { existing: None });
        };

        if let Some(same) = files
            .live
            .values()
            .find(|f| f.attachment.file_hash == file_hash)
        {
            return Ok(Preflight::AttachOnly {
                existing: Some(same.attachment.clone()),
            });
        }
        // `put` restores trashed bytes with the same hash
        if files.trash.values().any(|f| f.attachment.file_hash == file_hash) {
            return Ok(Preflight::AttachOnly { existing: None });
        }
        match files
            .live
            .values()
            .find(|f| f.attachment.original_name == name)
        {
            Some(clash) => Ok(Preflight::Conflict {
                existing: clash.attachment.clone(),
            }),
            None => Ok(Preflight::AttachOnly { existing: None }),
        }
    }
}

/// Semantic search that always returns the same ranked list
#[derive(Debug, Clone, Default)]
pub struct StaticSearch {
    candidates: Vec<SearchCandidate>,
}

impl StaticSearch {
    pub fn new(candidates: Vec<SearchCandidate>) -> Self {
        Self { candidates }
    }

    /// Rank `ids` best-first with descending scores
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates = ids
            .into_iter()
            .enumerate()
            .map(|(rank, id)| SearchCandidate::new(id, 1.0 / (rank as f64 + 1.0)))
            .collect();
        Self { candidates }
    }
}

#[async_trait]
impl SemanticSearch for StaticSearch {
    async fn search(&self, _canvas_id: &str, _query: &str) -> Result<Vec<SearchCandidate>> {
        Ok(self.candidates.clone())
    }
}
