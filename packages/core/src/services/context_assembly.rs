//! Generation Context Assembly
//!
//! Turns the inputs selected by `ContextHasher::select` into the material
//! handed to the generation step, together with the fingerprint that
//! generation must commit back. Using the same selection for both keeps the
//! recorded fingerprint honest about what the model saw.

use super::context_hasher::ContextHasher;
use crate::config::EngineConfig;
use crate::models::{Attachment, CanvasNode, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text borrowed from another node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextExcerpt {
    pub node_id: NodeId,
    pub text: String,
}

/// Everything the generation step needs for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub node_id: NodeId,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    pub parents: Vec<ContextExcerpt>,
    pub attachments: Vec<Attachment>,
    pub neuro_sources: Vec<ContextExcerpt>,
    /// Fingerprint to pass to `commit_generation` once the response arrives
    pub context_hash: String,
}

impl GenerationContext {
    /// Plain-text rendering of the context, prompt last
    pub fn render(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !self.parents.is_empty() {
            let body: Vec<&str> = self.parents.iter().map(|p| p.text.as_str()).collect();
            sections.push(format!("## Parent context\n{}", body.join("\n\n")));
        }
        if !self.neuro_sources.is_empty() {
            let body: Vec<&str> = self.neuro_sources.iter().map(|p| p.text.as_str()).collect();
            sections.push(format!("## Related cards\n{}", body.join("\n\n")));
        }
        if !self.attachments.is_empty() {
            let body: Vec<String> = self.attachments.iter().map(Attachment::reference_text).collect();
            sections.push(format!("## Attachments\n{}", body.join("\n")));
        }
        if let Some(quote) = &self.quote {
            sections.push(format!("## Quoted\n> {}", quote));
        }
        sections.push(self.prompt.clone());

        sections.join("\n\n")
    }
}

/// Assemble the generation context for `node_id`; `None` for unknown nodes
pub fn assemble_context(
    nodes: &BTreeMap<NodeId, CanvasNode>,
    hasher: &ContextHasher<'_>,
    config: &EngineConfig,
    node_id: &str,
) -> Option<GenerationContext> {
    let selection = hasher.select(node_id)?;
    let fallback = config.response_fallback_chars;

    let parents = selection
        .parents
        .iter()
        .filter_map(|parent| {
            parent.context_excerpt(fallback).map(|text| ContextExcerpt {
                node_id: parent.id.clone(),
                text,
            })
        })
        .collect();

    let neuro_sources = selection
        .neuro_search_ids
        .iter()
        .filter_map(|id| nodes.get(*id))
        .filter_map(|source| {
            source.context_excerpt(fallback).map(|text| ContextExcerpt {
                node_id: source.id.clone(),
                text,
            })
        })
        .collect();

    Some(GenerationContext {
        node_id: node_id.to_string(),
        prompt: selection.node.prompt.trim().to_string(),
        quote: selection.node.active_quote().map(str::to_string),
        parents,
        attachments: selection.attachments.into_iter().cloned().collect(),
        neuro_sources,
        context_hash: hasher.compute_context_hash(node_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphIndex;
    use crate::models::Edge;

    #[test]
    fn test_assembles_active_inputs_only() {
        let mut parent_a = CanvasNode::new_with_id("a", "PA".to_string());
        parent_a.summary = Some("summary A".to_string());
        let mut parent_b = CanvasNode::new_with_id("b", "PB".to_string());
        parent_b.summary = Some("summary B".to_string());
        let mut related = CanvasNode::new_with_id("r", "PR".to_string());
        related.response = Some("related response".to_string());

        let mut child = CanvasNode::new_with_id("c", " Why? ".to_string())
            .with_parents(vec!["a".to_string(), "b".to_string()])
            .with_quote("the quoted bit");
        child.excluded_context_node_ids = vec!["b".to_string()];
        child.neuro_search_node_ids = vec!["r".to_string(), "gone".to_string()];

        let nodes: BTreeMap<NodeId, CanvasNode> = [parent_a, parent_b, related, child]
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
        let edges = vec![Edge::new("a", "c"), Edge::new("b", "c")];
        let index = GraphIndex::build(nodes.values(), &edges);
        let config = EngineConfig::default();
        let hasher = ContextHasher::new(&nodes, &index, &config);

        let context = assemble_context(&nodes, &hasher, &config, "c").unwrap();
        assert_eq!(context.prompt, "Why?");
        assert_eq!(context.quote.as_deref(), Some("the quoted bit"));
        assert_eq!(context.parents.len(), 1);
        assert_eq!(context.parents[0].text, "summary A");
        assert_eq!(context.neuro_sources.len(), 1);
        assert_eq!(context.neuro_sources[0].node_id, "r");
        assert_eq!(context.context_hash, hasher.compute_context_hash("c"));

        let rendered = context.render();
        assert!(rendered.contains("summary A"));
        assert!(!rendered.contains("summary B"));
        assert!(rendered.ends_with("Why?"));
    }

    #[test]
    fn test_unknown_node_has_no_context() {
        let nodes: BTreeMap<NodeId, CanvasNode> = BTreeMap::new();
        let index = GraphIndex::build(nodes.values(), &[]);
        let config = EngineConfig::default();
        let hasher = ContextHasher::new(&nodes, &index, &config);
        assert!(assemble_context(&nodes, &hasher, &config, "ghost").is_none());
    }
}
