//! Staleness Cascade Tests
//!
//! End-to-end checks of marking, auto-heal and propagation through the
//! single `CanvasState::apply_mutation` entry point.

#[cfg(test)]
mod staleness_cascade_tests {
    use anyhow::Result;
    use cardspace_core::models::{Attachment, AttachmentKind, CanvasDocument, CanvasNode, Edge};
    use cardspace_core::services::{CanvasState, Mutation};
    use cardspace_core::{CanvasEvent, EngineConfig};
    use chrono::{TimeZone, Utc};

    fn node(id: &str, prompt: &str) -> CanvasNode {
        CanvasNode::new_with_id(id, prompt.to_string())
    }

    fn set_summary(id: &str, summary: &str) -> Mutation {
        Mutation::SetSummary {
            node_id: id.to_string(),
            summary: Some(summary.to_string()),
        }
    }

    fn set_prompt(id: &str, prompt: &str) -> Mutation {
        Mutation::SetPrompt {
            node_id: id.to_string(),
            prompt: prompt.to_string(),
        }
    }

    /// Generate `id` against its current inputs
    fn generate(state: &mut CanvasState, id: &str) -> Result<()> {
        let hash = state.compute_context_hash(id);
        state.commit_generation(id, format!("response for {}", id), hash)?;
        Ok(())
    }

    /// A (summary S1) → B (prompt Q), with B generated
    fn scenario_a() -> Result<CanvasState> {
        let mut state = CanvasState::default();
        let mut a = node("A", "root question");
        a.summary = Some("S1".to_string());
        state.apply_mutation(Mutation::CreateNode { node: a })?;
        state.apply_mutation(Mutation::CreateNode {
            node: node("B", "Q").with_parents(vec!["A".to_string()]),
        })?;
        generate(&mut state, "B")?;
        Ok(state)
    }

    #[test]
    fn test_scenario_a_marks_then_heals() -> Result<()> {
        let mut state = scenario_a()?;
        let h1 = state.compute_context_hash("B");
        assert_eq!(state.node("B").unwrap().last_context_hash.as_deref(), Some(h1.as_str()));
        assert!(!state.is_stale("B"));

        state.apply_mutation(set_summary("A", "S2"))?;
        let h2 = state.compute_context_hash("B");
        assert_ne!(h1, h2);
        assert!(state.is_stale("B"));

        let outcome = state.apply_mutation(set_summary("A", "S1"))?;
        assert_eq!(state.compute_context_hash("B"), h1);
        assert!(!state.is_stale("B"));
        assert!(outcome.events.contains(&CanvasEvent::StalenessChanged {
            node_id: "B".to_string(),
            is_stale: false,
        }));
        Ok(())
    }

    #[test]
    fn test_prompt_edit_and_revert_heals() -> Result<()> {
        let mut state = scenario_a()?;

        state.apply_mutation(set_prompt("B", "Q, rephrased"))?;
        assert!(state.is_stale("B"));

        state.apply_mutation(set_prompt("B", "Q"))?;
        assert!(!state.is_stale("B"));
        Ok(())
    }

    #[test]
    fn test_on_input_mutated_is_idempotent() -> Result<()> {
        let mut state = scenario_a()?;
        state.apply_mutation(set_summary("A", "S2"))?;

        let first = state.on_input_mutated("B")?;
        let second = state.on_input_mutated("B")?;

        assert!(state.is_stale("B"));
        assert!(first.cascade.transitions.is_empty());
        assert!(second.cascade.transitions.is_empty());
        assert_eq!(second.cascade.evaluated, vec!["B".to_string()]);
        Ok(())
    }

    #[test]
    fn test_cascade_reaches_generated_grandchildren() -> Result<()> {
        let mut state = scenario_a()?;
        state.apply_mutation(Mutation::CreateNode {
            node: node("C", "follow-up").with_parents(vec!["B".to_string()]),
        })?;
        generate(&mut state, "C")?;

        // A new response on B is a new input for C
        state.apply_mutation(Mutation::SetResponse {
            node_id: "B".to_string(),
            response: Some("hand-edited response".to_string()),
        })?;
        assert!(state.is_stale("C"));
        assert!(!state.is_stale("B"));

        generate(&mut state, "C")?;
        assert!(!state.is_stale("C"));
        Ok(())
    }

    #[test]
    fn test_sibling_branches_are_judged_independently() -> Result<()> {
        let mut state = scenario_a()?;
        let mut other = node("X", "other root");
        other.summary = Some("X1".to_string());
        state.apply_mutation(Mutation::CreateNode { node: other })?;
        state.apply_mutation(Mutation::CreateNode {
            node: node("Y", "sibling").with_parents(vec!["X".to_string()]),
        })?;
        generate(&mut state, "Y")?;

        state.apply_mutation(set_summary("A", "S2"))?;
        assert!(state.is_stale("B"));
        assert!(!state.is_stale("Y"));
        Ok(())
    }

    #[test]
    fn test_parent_order_changes_hash_and_revert_restores_it() -> Result<()> {
        let mut state = CanvasState::default();
        for id in ["P1", "P2"] {
            let mut parent = node(id, id);
            parent.summary = Some(format!("summary of {}", id));
            state.apply_mutation(Mutation::CreateNode { node: parent })?;
        }
        state.apply_mutation(Mutation::CreateNode {
            node: node("C", "child").with_parents(vec!["P1".to_string(), "P2".to_string()]),
        })?;
        generate(&mut state, "C")?;
        let original = state.compute_context_hash("C");

        let reorder = |order: [&str; 2]| Mutation::ReorderParents {
            node_id: "C".to_string(),
            parent_ids: order.iter().map(|s| s.to_string()).collect(),
        };

        state.apply_mutation(reorder(["P2", "P1"]))?;
        assert_ne!(state.compute_context_hash("C"), original);
        assert!(state.is_stale("C"));

        state.apply_mutation(reorder(["P1", "P2"]))?;
        assert_eq!(state.compute_context_hash("C"), original);
        assert!(!state.is_stale("C"));
        Ok(())
    }

    #[test]
    fn test_reorder_rejects_different_parent_set() -> Result<()> {
        let mut state = scenario_a()?;
        let result = state.apply_mutation(Mutation::ReorderParents {
            node_id: "B".to_string(),
            parent_ids: vec!["A".to_string(), "A".to_string()],
        });
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_missing_and_empty_lists_hash_identically() -> Result<()> {
        let missing: CanvasNode = serde_json::from_value(serde_json::json!({
            "id": "n",
            "prompt": "same",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z"
        }))?;
        let empty: CanvasNode = serde_json::from_value(serde_json::json!({
            "id": "n",
            "prompt": "same",
            "excludedAttachmentIds": [],
            "excludedContextNodeIds": null,
            "neuroSearchNodeIds": [],
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z"
        }))?;

        let config = EngineConfig::default();
        let a = CanvasState::from_document(
            CanvasDocument {
                nodes: vec![missing],
                edges: vec![],
            },
            config.clone(),
        );
        let b = CanvasState::from_document(
            CanvasDocument {
                nodes: vec![empty],
                edges: vec![],
            },
            config,
        );
        assert_eq!(a.compute_context_hash("n"), b.compute_context_hash("n"));
        Ok(())
    }

    #[test]
    fn test_scenario_c_identical_reupload_is_noop() -> Result<()> {
        let attachment = Attachment {
            attachment_id: "att-1".to_string(),
            kind: AttachmentKind::Text,
            original_name: "notes.md".to_string(),
            mime: "text/markdown".to_string(),
            size_bytes: 42,
            file_hash: "abc".to_string(),
            file_updated_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            ingestion_mode: Default::default(),
        };

        let mut state = CanvasState::default();
        state.apply_mutation(Mutation::CreateNode {
            node: node("N", "read this").with_attachment(attachment.clone()),
        })?;
        generate(&mut state, "N")?;
        let before = state.compute_context_hash("N");
        let updated_at = state.node("N").unwrap().updated_at;

        let outcome = state.apply_mutation(Mutation::AddAttachment {
            node_id: "N".to_string(),
            attachment,
        })?;

        assert!(!outcome.changed);
        assert!(outcome.cascade.evaluated.is_empty());
        assert_eq!(state.compute_context_hash("N"), before);
        assert!(!state.is_stale("N"));
        assert_eq!(state.node("N").unwrap().updated_at, updated_at);
        Ok(())
    }

    #[test]
    fn test_attachment_exclusion_undo_heals() -> Result<()> {
        let attachment = Attachment {
            attachment_id: "att-1".to_string(),
            kind: AttachmentKind::Image,
            original_name: "chart.png".to_string(),
            mime: "image/png".to_string(),
            size_bytes: 1024,
            file_hash: "f00d".to_string(),
            file_updated_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            ingestion_mode: Default::default(),
        };
        let mut state = CanvasState::default();
        state.apply_mutation(Mutation::CreateNode {
            node: node("N", "describe").with_attachment(attachment),
        })?;
        generate(&mut state, "N")?;

        let toggle = |excluded| Mutation::SetAttachmentExcluded {
            node_id: "N".to_string(),
            attachment_id: "att-1".to_string(),
            excluded,
        };
        state.apply_mutation(toggle(true))?;
        assert!(state.is_stale("N"));
        state.apply_mutation(toggle(false))?;
        assert!(!state.is_stale("N"));
        Ok(())
    }

    #[test]
    fn test_deleting_parent_reevaluates_children() -> Result<()> {
        let mut state = scenario_a()?;
        let outcome = state.apply_mutation(Mutation::DeleteNode {
            node_id: "A".to_string(),
        })?;

        assert!(state.node("A").is_none());
        assert!(state.edges().is_empty());
        assert!(state.is_stale("B"));
        assert!(outcome.events.contains(&CanvasEvent::StalenessChanged {
            node_id: "B".to_string(),
            is_stale: true,
        }));
        Ok(())
    }

    #[test]
    fn test_edge_removal_and_restore_heals() -> Result<()> {
        let mut state = scenario_a()?;

        state.apply_mutation(Mutation::RemoveEdge {
            edge: Edge::new("A", "B"),
        })?;
        assert!(state.is_stale("B"));
        assert!(state.index().parents_of("B").is_empty());

        state.apply_mutation(Mutation::AddEdge {
            edge: Edge::new("A", "B"),
            position: None,
        })?;
        assert!(!state.is_stale("B"));
        Ok(())
    }

    #[test]
    fn test_edge_on_edgeless_child_keeps_declared_parents() -> Result<()> {
        let mut a = node("a", "root");
        a.summary = Some("about ownership".to_string());
        let mut x = node("x", "other root");
        x.summary = Some("about traits".to_string());
        let c = node("c", "compare").with_parents(vec!["a".to_string()]);
        let mut state = CanvasState::from_document(
            CanvasDocument {
                nodes: vec![a, x, c],
                edges: vec![],
            },
            EngineConfig::default(),
        );
        generate(&mut state, "c")?;
        let generated = state.compute_context_hash("c");

        state.apply_mutation(Mutation::AddEdge {
            edge: Edge::new("x", "c"),
            position: None,
        })?;
        assert_eq!(state.index().parents_of("c"), ["a".to_string(), "x".to_string()]);
        assert!(state.ancestors("c").contains("a"));
        let result = state.filter_search_candidates(
            "c",
            vec![cardspace_core::models::SearchCandidate::new("a", 0.9)],
        );
        assert!(result.candidates.is_empty());
        assert!(state.is_stale("c"));

        // Dropping the new parent restores the generated inputs
        state.apply_mutation(Mutation::RemoveEdge {
            edge: Edge::new("x", "c"),
        })?;
        assert_eq!(state.index().parents_of("c"), ["a".to_string()]);
        assert_eq!(state.compute_context_hash("c"), generated);
        assert!(!state.is_stale("c"));
        Ok(())
    }

    #[test]
    fn test_load_reconciles_flags() -> Result<()> {
        let state = scenario_a()?;
        let mut document = state.to_document();

        // Persisted flag disagrees with the recorded fingerprint
        for node in &mut document.nodes {
            if node.id == "B" {
                node.is_stale = true;
            }
        }
        let reloaded = CanvasState::from_document(document, EngineConfig::default());
        assert!(!reloaded.is_stale("B"));
        Ok(())
    }

    #[test]
    fn test_cycle_in_persisted_graph_terminates() -> Result<()> {
        let mut a = node("A", "a");
        a.last_context_hash = Some("old".to_string());
        let mut b = node("B", "b");
        b.last_context_hash = Some("old".to_string());
        let document = CanvasDocument {
            nodes: vec![a, b],
            edges: vec![Edge::new("A", "B"), Edge::new("B", "A")],
        };

        let mut state = CanvasState::from_document(document, EngineConfig::default());
        assert!(state.is_stale("A"));
        assert!(state.is_stale("B"));
        assert!(state.descendants("A").contains("B"));
        assert!(!state.descendants("A").contains("A"));

        state.apply_mutation(set_prompt("A", "changed"))?;
        assert!(state.is_stale("A"));
        Ok(())
    }
}
