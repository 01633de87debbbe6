//! Graph configuration.

use serde::{Deserialize, Serialize};

/// Runtime switches of a [`BoxGraph`](crate::graph::BoxGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Run `validate_requirements` when a transaction ends.
    pub validate_on_commit: bool,
    /// Also run the pointer index consistency check when a transaction ends.
    pub verify_pointers_on_commit: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            validate_on_commit: true,
            verify_pointers_on_commit: false,
        }
    }
}

impl GraphConfig {
    /// Reads `BOXGRAPH_VALIDATE_ON_COMMIT` and `BOXGRAPH_VERIFY_POINTERS`,
    /// falling back to the defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let mut config = GraphConfig::default();
        if let Some(flag) = env_flag("BOXGRAPH_VALIDATE_ON_COMMIT") {
            config.validate_on_commit = flag;
        }
        if let Some(flag) = env_flag("BOXGRAPH_VERIFY_POINTERS") {
            config.verify_pointers_on_commit = flag;
        }
        config
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    parse_flag(&std::env::var(name).ok()?)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
