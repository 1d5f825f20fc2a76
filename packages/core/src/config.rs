//! Engine Configuration
//!
//! Tunables for traversal bounds, fingerprint construction and search
//! filtering. Hosts usually keep the defaults; a settings document may
//! override any subset of fields.

use serde::{Deserialize, Serialize};

/// Hard bound on traversal steps (lineage walks and cascade worklists)
pub const DEFAULT_MAX_TRAVERSAL_STEPS: usize = 5000;

/// Characters of a parent's response used when it has no summary yet
pub const DEFAULT_RESPONSE_FALLBACK_CHARS: usize = 900;

/// Maximum neuro-search results retained per node
pub const DEFAULT_NEURO_SEARCH_TOP_K: usize = 5;

/// Capacity of the domain event broadcast channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Configuration for the staleness engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub max_traversal_steps: usize,
    pub response_fallback_chars: usize,
    pub neuro_search_top_k: usize,
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_traversal_steps: DEFAULT_MAX_TRAVERSAL_STEPS,
            response_fallback_chars: DEFAULT_RESPONSE_FALLBACK_CHARS,
            neuro_search_top_k: DEFAULT_NEURO_SEARCH_TOP_K,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON settings document
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.event_channel_capacity == 0 {
            anyhow::bail!("eventChannelCapacity must be greater than zero");
        }
        Ok(config)
    }

    pub fn with_max_traversal_steps(mut self, steps: usize) -> Self {
        self.max_traversal_steps = steps;
        self
    }

    pub fn with_neuro_search_top_k(mut self, top_k: usize) -> Self {
        self.neuro_search_top_k = top_k;
        self
    }
}
