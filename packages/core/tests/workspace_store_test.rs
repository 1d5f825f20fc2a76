//! Workspace Persistence Tests

#[cfg(test)]
mod workspace_store_tests {
    use anyhow::Result;
    use cardspace_core::models::{CanvasDocument, CanvasNode, Edge};
    use cardspace_core::services::CanvasState;
    use cardspace_core::store::{JsonFileWorkspaceStore, WorkspaceStore};
    use cardspace_core::EngineConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_document_loads_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = JsonFileWorkspaceStore::new(temp_dir.path());

        let document = store.load("never-saved").await?;
        assert_eq!(document, CanvasDocument::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_replaces_file_without_leftovers() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = JsonFileWorkspaceStore::new(temp_dir.path().join("nested"));
        let document = CanvasDocument {
            nodes: vec![
                CanvasNode::new_with_id("a", "first".to_string()),
                CanvasNode::new_with_id("b", "second".to_string()).with_parents(vec!["a".to_string()]),
            ],
            edges: vec![Edge::new("a", "b")],
        };

        store.save("board", &document).await?;
        store.save("board", &document).await?;

        let mut names: Vec<String> = std::fs::read_dir(temp_dir.path().join("nested"))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["board.json".to_string()]);

        assert_eq!(store.load("board").await?, document);
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_document_loads_and_reconciles() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let raw = r#"{
            "nodes": [
                {
                    "id": "root",
                    "prompt": "Explain borrowing",
                    "summary": "Borrowing lends access without moving ownership",
                    "createdAt": "2025-01-01T00:00:00Z",
                    "updatedAt": "2025-01-01T00:00:00Z"
                },
                {
                    "id": "child",
                    "prompt": "And lifetimes?",
                    "parentId": "root",
                    "parentIds": null,
                    "excludedAttachmentIds": null,
                    "isStale": true,
                    "createdAt": "2025-01-01T00:00:00Z",
                    "updatedAt": "2025-01-01T00:00:00Z"
                }
            ]
        }"#;
        std::fs::write(temp_dir.path().join("legacy.json"), raw)?;

        let store = JsonFileWorkspaceStore::new(temp_dir.path());
        let document = store.load("legacy").await?;
        let state = CanvasState::from_document(document, EngineConfig::default());

        assert_eq!(state.index().parents_of("child"), ["root".to_string()]);
        // Never generated, so never tracked as stale
        assert!(!state.is_stale("child"));
        assert_eq!(state.edges(), [Edge::new("root", "child")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_document_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        std::fs::write(temp_dir.path().join("broken.json"), "{ not json")?;

        let store = JsonFileWorkspaceStore::new(temp_dir.path());
        let err = store.load("broken").await.unwrap_err();
        assert!(err.to_string().contains("parsing"));
        Ok(())
    }
}
