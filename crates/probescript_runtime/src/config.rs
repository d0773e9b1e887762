// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime configuration.
//!
//! Stored as RON. Fields missing from the file take their defaults, so older
//! files keep loading as new limits are added.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Current runtime config format version
pub const RUNTIME_CONFIG_VERSION: u32 = 1;

/// Limits and timeouts applied to every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Config format version
    pub version: u32,
    /// How long a single agent call may take
    pub rpc_timeout_ms: u64,
    /// Loop iteration cap when a node does not set `maxIterations`
    pub default_max_iterations: u32,
    /// Flow nodes executed per run before the run is stopped with a warning
    pub max_flow_steps: usize,
    /// Deepest chain of pure nodes resolved for a single input
    pub max_resolution_depth: usize,
    /// Deepest loop nesting
    pub max_loop_nesting: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            version: RUNTIME_CONFIG_VERSION,
            rpc_timeout_ms: 5000,
            default_max_iterations: 1000,
            max_flow_steps: 10_000,
            max_resolution_depth: 64,
            max_loop_nesting: 16,
        }
    }
}

impl RuntimeConfig {
    /// Agent call timeout
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Parse from RON text
    pub fn from_ron(content: &str) -> std::io::Result<Self> {
        let config: RuntimeConfig = ron::from_str(content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        if config.version > RUNTIME_CONFIG_VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Runtime config version {} is newer than supported version {}",
                    config.version, RUNTIME_CONFIG_VERSION
                ),
            ));
        }

        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        tracing::debug!(path = %path.display(), "loaded runtime config");
        Ok(config)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);

        let content = ron::ser::to_string_pretty(self, pretty)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.rpc_timeout(), Duration::from_secs(5));
        assert_eq!(config.default_max_iterations, 1000);
        assert_eq!(config.max_flow_steps, 10_000);
    }

    #[test]
    fn test_serialization() {
        let config = RuntimeConfig {
            rpc_timeout_ms: 250,
            ..Default::default()
        };
        let ron_str = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let loaded = RuntimeConfig::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded = RuntimeConfig::from_ron("(rpc_timeout_ms: 100)").unwrap();
        assert_eq!(loaded.rpc_timeout_ms, 100);
        assert_eq!(loaded.max_resolution_depth, 64);
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = RuntimeConfig::from_ron("(version: 99)").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("probescript-config-{}.ron", std::process::id()));
        let config = RuntimeConfig {
            max_loop_nesting: 4,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = RuntimeConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}
