//! System configuration.

use serde::{Deserialize, Serialize};

use crate::animation::DEFAULT_FRAMES_PER_SECOND;
use crate::library::EMPTY_ANIMATION_NAME;

/// Configuration for asset discovery, persistence and per-tick limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// File extension of persisted trees, without the dot.
    pub tree_extension: String,
    /// File extension of persisted animations, without the dot.
    pub animation_extension: String,
    /// Name of the built-in animation played by start nodes.
    pub empty_animation_name: String,
    /// Frame rate given to animations created through the system.
    pub default_frames_per_second: f32,
    /// Indent saved documents.
    pub pretty_documents: bool,
    /// Maximum events to retain per run.
    pub max_events_per_tick: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            tree_extension: "tree".to_string(),
            animation_extension: "anim".to_string(),
            empty_animation_name: EMPTY_ANIMATION_NAME.to_string(),
            default_frames_per_second: DEFAULT_FRAMES_PER_SECOND,
            pretty_documents: true,
            max_events_per_tick: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: SystemConfig = serde_json::from_str(r#"{ "tree_extension": "graph" }"#).unwrap();
        assert_eq!(cfg.tree_extension, "graph");
        assert_eq!(cfg.animation_extension, "anim");
        assert_eq!(cfg.max_events_per_tick, 1024);
    }
}
