//! Attachment Metadata
//!
//! Attachments are files dropped onto a card. Only metadata lives on the node;
//! the bytes are owned by the external attachment store and addressed by
//! `file_hash`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to an attachment by the attachment store
pub type AttachmentId = String;

/// What kind of file an attachment carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Text,
}

/// How the attachment content reaches the model
///
/// - `Inline`: the whole file is inserted into the prompt
/// - `Chunked`: the file is split and only relevant chunks are retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionMode {
    Inline,
    Chunked,
}

impl Default for IngestionMode {
    fn default() -> Self {
        Self::Inline
    }
}

/// Attachment metadata tracked on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Store-assigned identifier
    pub attachment_id: AttachmentId,

    /// Image or text
    pub kind: AttachmentKind,

    /// File name as uploaded by the user
    pub original_name: String,

    /// MIME type reported at upload time
    pub mime: String,

    /// Size of the stored bytes
    pub size_bytes: u64,

    /// Content hash of the stored bytes (empty while hashing is still in flight)
    #[serde(default)]
    pub file_hash: String,

    /// When the stored bytes were last written
    pub file_updated_at: DateTime<Utc>,

    #[serde(default)]
    pub ingestion_mode: IngestionMode,
}

impl Attachment {
    /// Whether the store has finished hashing the bytes
    pub fn has_content_hash(&self) -> bool {
        !self.file_hash.trim().is_empty()
    }

    /// Human readable reference used when assembling generation context
    pub fn reference_text(&self) -> String {
        let label = match (self.kind, self.ingestion_mode) {
            (AttachmentKind::Image, _) => "image",
            (AttachmentKind::Text, IngestionMode::Inline) => "file",
            (AttachmentKind::Text, IngestionMode::Chunked) => "document",
        };
        format!("[{}: {} ({})]", label, self.original_name, self.mime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attachment_deserializes_camel_case() {
        let value = json!({
            "attachmentId": "att-1",
            "kind": "image",
            "originalName": "diagram.png",
            "mime": "image/png",
            "sizeBytes": 2048,
            "fileHash": "abc",
            "fileUpdatedAt": "2025-01-03T10:00:00Z",
            "ingestionMode": "inline"
        });

        let attachment: Attachment = serde_json::from_value(value).unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Image);
        assert_eq!(attachment.size_bytes, 2048);
        assert!(attachment.has_content_hash());
    }

    #[test]
    fn test_missing_ingestion_mode_defaults_to_inline() {
        let value = json!({
            "attachmentId": "att-2",
            "kind": "text",
            "originalName": "notes.md",
            "mime": "text/markdown",
            "sizeBytes": 12,
            "fileUpdatedAt": "2025-01-03T10:00:00Z"
        });

        let attachment: Attachment = serde_json::from_value(value).unwrap();
        assert_eq!(attachment.ingestion_mode, IngestionMode::Inline);
        assert!(!attachment.has_content_hash());
        assert_eq!(attachment.reference_text(), "[file: notes.md (text/markdown)]");
    }
}
