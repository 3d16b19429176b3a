//! Configuration for re-encoding rewritten bodies

use serde::{Deserialize, Serialize};

/// Compression configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Compression level used when re-encoding (0-9)
    #[serde(default = "default_level")]
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> u32 {
    6
}

impl CompressionConfig {
    /// Create a config with the given level, clamped to 9
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompressionConfig::default();
        assert_eq!(config.level, 6);
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(CompressionConfig::with_level(12).level, 9);
        assert_eq!(CompressionConfig::with_level(1).level, 1);
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: CompressionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CompressionConfig::default());
    }
}
