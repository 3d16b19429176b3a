//! Configuration types

use refract_encoding::CompressionConfig;
use serde::{Deserialize, Serialize};

/// A rules file: pipeline settings plus an ordered list of rules
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RulesFile {
    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Rules, in application order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Settings shared by every chain a pipeline builds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Cap on the body-reduction buffer in bytes (unbounded when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_body_size: Option<usize>,

    /// Chunks the push adapter queues before `write` waits
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Re-encoding settings
    #[serde(default)]
    pub compression: CompressionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_body_size: None,
            channel_capacity: default_channel_capacity(),
            compression: CompressionConfig::default(),
        }
    }
}

fn default_channel_capacity() -> usize {
    8
}

/// One rewriting rule
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    /// Rule name, used in logs and errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// When the rule applies (always, when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<ConditionConfig>,

    /// Per-chunk literal replacements (streaming)
    #[serde(default)]
    pub replace: Vec<ReplaceConfig>,

    /// JSON edits applied to the whole body
    #[serde(default)]
    pub json: Vec<JsonOperation>,
}

impl RuleConfig {
    /// Name for logs, falling back to the rule's position
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("rule #{index}"))
    }
}

/// Rule condition; every field that is set must hold
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConditionConfig {
    /// Exact request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Request path prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    /// Request path regex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_regex: Option<String>,

    /// Request method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Response status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Response header check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderCondition>,
}

/// Response header must be present, optionally containing a substring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeaderCondition {
    /// Header name
    pub name: String,

    /// Substring the value must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
}

/// Literal replacement applied to each chunk independently
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplaceConfig {
    /// Text to find
    pub from: String,

    /// Replacement text
    pub to: String,
}

/// JSON transformation operation
///
/// Paths are dotted (`user.age`), with an optional leading `$.`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum JsonOperation {
    /// Set a field, creating it if missing
    Set {
        /// Path to set
        path: String,
        /// Value to set
        value: serde_json::Value,
    },

    /// Add a field only if it is missing
    Add {
        /// Path to add
        path: String,
        /// Value to add
        value: serde_json::Value,
    },

    /// Replace a field only if it exists
    Replace {
        /// Path to replace
        path: String,
        /// New value
        value: serde_json::Value,
    },

    /// Remove a field
    Remove {
        /// Path to remove
        path: String,
    },

    /// Rename a field
    Rename {
        /// Old path
        from: String,
        /// New path
        to: String,
    },
}
