//! Neuro-Search Filtering Tests
//!
//! Lineage exclusion and search-result drift, exercised through `CanvasState`.

#[cfg(test)]
mod neuro_search_tests {
    use anyhow::Result;
    use cardspace_core::models::{CanvasNode, Edge, SearchCandidate};
    use cardspace_core::services::{CanvasState, Mutation};
    use cardspace_core::EngineConfig;
    use std::collections::HashSet;

    fn ensure_node(state: &mut CanvasState, id: &str) -> Result<()> {
        if state.node(id).is_none() {
            state.apply_mutation(Mutation::CreateNode {
                node: CanvasNode::new_with_id(id, format!("prompt {}", id)),
            })?;
        }
        Ok(())
    }

    fn build(edges: &[(&str, &str)], extra: &[&str]) -> Result<CanvasState> {
        let mut state = CanvasState::default();
        for (parent, child) in edges {
            ensure_node(&mut state, parent)?;
            ensure_node(&mut state, child)?;
            state.apply_mutation(Mutation::AddEdge {
                edge: Edge::new(*parent, *child),
                position: None,
            })?;
        }
        for id in extra {
            ensure_node(&mut state, id)?;
        }
        Ok(state)
    }

    fn candidates(ids: &[&str]) -> Vec<SearchCandidate> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| SearchCandidate::new(*id, 0.9 - i as f64 * 0.1))
            .collect()
    }

    #[test]
    fn test_scenario_b_chain_excludes_lineage() -> Result<()> {
        let state = build(&[("A", "B"), ("B", "C")], &["D"])?;
        let result = state.filter_search_candidates("B", candidates(&["A", "C", "D"]));
        assert_eq!(result.node_ids(), vec!["D".to_string()]);
        Ok(())
    }

    #[test]
    fn test_lineage_never_returned_for_any_node() -> Result<()> {
        // Diamond with a tail plus an unrelated pair
        let state = build(
            &[("R", "L"), ("R", "M"), ("L", "J"), ("M", "J"), ("J", "T"), ("U", "V")],
            &["W"],
        )?;
        let all = ["R", "L", "M", "J", "T", "U", "V", "W"];
        let config = EngineConfig::default().with_neuro_search_top_k(all.len());

        let state = CanvasState::from_document(state.to_document(), config);
        for node in all {
            let forbidden: HashSet<String> = state
                .ancestors(node)
                .into_iter()
                .chain(state.descendants(node))
                .chain(std::iter::once(node.to_string()))
                .collect();

            let result = state.filter_search_candidates(node, candidates(&all));
            for id in result.node_ids() {
                assert!(!forbidden.contains(&id), "{} leaked into results for {}", id, node);
            }
            let expected = all.len() - forbidden.len();
            assert_eq!(result.candidates.len(), expected, "unexpected count for {}", node);
        }
        Ok(())
    }

    #[test]
    fn test_committed_results_feed_the_fingerprint() -> Result<()> {
        let mut state = build(&[], &["N", "S1", "S2"])?;
        let hash = state.compute_context_hash("N");
        state.commit_generation("N", "answer", hash)?;

        let result = state.filter_search_candidates("N", candidates(&["S1"]));
        state.apply_mutation(Mutation::SetNeuroSearchResults {
            node_id: "N".to_string(),
            result,
        })?;
        assert!(state.is_stale("N"));

        // Excluding the only result restores the generated inputs
        state.apply_mutation(Mutation::SetContextExcluded {
            node_id: "N".to_string(),
            context_node_id: "S1".to_string(),
            excluded: true,
        })?;
        assert!(!state.is_stale("N"));
        Ok(())
    }

    #[test]
    fn test_search_results_go_stale_when_sources_change() -> Result<()> {
        let mut state = build(&[], &["N", "S"])?;
        let result = state.filter_search_candidates("N", candidates(&["S"]));
        state.apply_mutation(Mutation::SetNeuroSearchResults {
            node_id: "N".to_string(),
            result,
        })?;
        assert!(!state.is_search_result_stale("N"));

        std::thread::sleep(std::time::Duration::from_millis(5));
        state.apply_mutation(Mutation::SetSummary {
            node_id: "S".to_string(),
            summary: Some("fresh insight".to_string()),
        })?;
        assert!(state.is_search_result_stale("N"));
        Ok(())
    }

    #[test]
    fn test_deleted_source_counts_as_drift() -> Result<()> {
        let mut state = build(&[], &["N", "S"])?;
        let result = state.filter_search_candidates("N", candidates(&["S"]));
        state.apply_mutation(Mutation::SetNeuroSearchResults {
            node_id: "N".to_string(),
            result,
        })?;

        state.apply_mutation(Mutation::DeleteNode {
            node_id: "S".to_string(),
        })?;
        assert!(state.is_search_result_stale("N"));
        Ok(())
    }
}
