//! Batch pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix for aggregate output names
pub const DEFAULT_OUTPUT_PREFIX: &str = "marked_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Prepended to each source name when outputs are written or archived
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Fail an item whose render takes longer than this (disabled when unset).
    /// The next item still waits for the abandoned render to finish.
    #[serde(default)]
    pub item_timeout_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_prefix: default_output_prefix(),
            item_timeout_ms: None,
        }
    }
}

impl PipelineConfig {
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.output_prefix.contains(['/', '\\']) {
            return Err(format!(
                "pipeline.output_prefix cannot contain path separators, got '{}'",
                self.output_prefix
            ));
        }
        if self.item_timeout_ms == Some(0) {
            return Err("pipeline.item_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Output name for a source name
    pub fn output_name(&self, name: &str) -> String {
        format!("{}{}", self.output_prefix, name)
    }
}

fn default_output_prefix() -> String {
    DEFAULT_OUTPUT_PREFIX.to_string()
}
