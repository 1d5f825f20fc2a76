//! JSON file workspace persistence
//!
//! One `<canvas_id>.json` file per canvas under a root directory. Writes go
//! to a temporary sibling first and are renamed into place, so a crash never
//! leaves a truncated document behind.

use super::WorkspaceStore;
use crate::models::CanvasDocument;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonFileWorkspaceStore {
    root: PathBuf,
}

impl JsonFileWorkspaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `canvas_id`; rejects ids that would escape the root
    pub fn document_path(&self, canvas_id: &str) -> Result<PathBuf> {
        let id = canvas_id.trim();
        if id.is_empty() {
            bail!("canvas id must not be empty");
        }
        let candidate = Path::new(id);
        if candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
            || candidate.components().count() != 1
        {
            bail!("invalid canvas id: {}", canvas_id);
        }
        Ok(self.root.join(format!("{}.json", id)))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl WorkspaceStore for JsonFileWorkspaceStore {
    async fn load(&self, canvas_id: &str) -> Result<CanvasDocument> {
        let path = self.document_path(canvas_id)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No saved document for canvas {}, starting empty", canvas_id);
                return Ok(CanvasDocument::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    async fn save(&self, canvas_id: &str, document: &CanvasDocument) -> Result<()> {
        let path = self.document_path(canvas_id)?;
        let bytes = serde_json::to_vec_pretty(document)?;
        write_atomic(&path, &bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(
            "Saved canvas {} ({} nodes) to {}",
            canvas_id,
            document.nodes.len(),
            path.display()
        );
        Ok(())
    }
}
