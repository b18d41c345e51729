//! Engine configuration
//!
//! Tunable thresholds only. The scoring weights and relation bands are
//! fixed constants in `align` (downstream confidence displays depend on
//! them); everything here may vary per deployment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the alignment engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Days a doc may lag its described entities before it counts as stale
    #[serde(default = "default_staleness_threshold_days")]
    pub staleness_threshold_days: i64,

    /// Cap on emitted mapping rows per entity
    #[serde(default = "default_max_mappings_per_entity")]
    pub max_mappings_per_entity: usize,

    /// External link probing
    #[serde(default)]
    pub link: LinkConfig,

    /// Priority decay
    #[serde(default)]
    pub priority: PriorityConfig,
}

/// External link checking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Simultaneous probes
    #[serde(default = "default_link_concurrency")]
    pub concurrency: usize,

    /// Per-check timeout in seconds; a timed-out check is unknown
    #[serde(default = "default_link_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether to probe external links over the network at all
    #[serde(default)]
    pub probe_external: bool,
}

/// Priority formula configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Half-life in days of the recency decay
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
}

fn default_staleness_threshold_days() -> i64 {
    30
}

fn default_max_mappings_per_entity() -> usize {
    5
}

fn default_link_concurrency() -> usize {
    8
}

fn default_link_timeout_secs() -> u64 {
    5
}

fn default_half_life_days() -> f64 {
    30.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_days: default_staleness_threshold_days(),
            max_mappings_per_entity: default_max_mappings_per_entity(),
            link: LinkConfig::default(),
            priority: PriorityConfig::default(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            concurrency: default_link_concurrency(),
            timeout_secs: default_link_timeout_secs(),
            probe_external: false,
        }
    }
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file or return defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: EngineConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.staleness_threshold_days, 30);
        assert_eq!(config.max_mappings_per_entity, 5);
        assert!(!config.link.probe_external);
        assert!(config.priority.half_life_days > 0.0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str("staleness_threshold_days = 14").unwrap();
        assert_eq!(config.staleness_threshold_days, 14);
        assert_eq!(config.max_mappings_per_entity, 5);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docalign.toml");

        let mut config = EngineConfig::default();
        config.link.concurrency = 2;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.link.concurrency, 2);
    }
}
