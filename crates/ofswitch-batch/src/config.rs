//! Configuration file support.
//!
//! ```toml
//! [session]
//! request_timeout_ms = 10000
//!
//! [batch]
//! max_concurrent_items = 32
//! dependency_barriers = true
//! ```

use ofswitch_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{BatchError, BatchRpcResult};

/// Flat batch processing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items of one step in flight at the same time.
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,

    /// Insert barriers between steps that depend on each other, such as a
    /// flow add following the group add it references.
    #[serde(default = "default_dependency_barriers")]
    pub dependency_barriers: bool,

    /// Barrier placement used when a request does not say whether it wants
    /// a barrier after each entity-kind grouping.
    #[serde(default = "default_barrier_after_groupings")]
    pub barrier_after_groupings: bool,
}

fn default_max_concurrent_items() -> usize {
    64
}

fn default_dependency_barriers() -> bool {
    true
}

fn default_barrier_after_groupings() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_items: default_max_concurrent_items(),
            dependency_barriers: default_dependency_barriers(),
            barrier_after_groupings: default_barrier_after_groupings(),
        }
    }
}

impl BatchConfig {
    /// Validate configuration
    pub fn validate(&self) -> BatchRpcResult<()> {
        if self.max_concurrent_items == 0 {
            return Err(BatchError::Config(
                "max_concurrent_items must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfSwitchConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl OfSwitchConfig {
    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> BatchRpcResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BatchError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> BatchRpcResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    BatchError::Config(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(BatchError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> BatchRpcResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BatchError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> BatchRpcResult<()> {
        self.session.validate()?;
        self.batch.validate()
    }
}
