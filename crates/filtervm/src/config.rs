//! VM configuration.
//!
//! ```yaml
//! budget: 25000000
//! optimize: true
//! native_filters: true
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::DEFAULT_BUDGET;
use crate::prepare::PrepareOptions;

/// Errors that can occur when loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the config file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parse error.
    #[error("failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A zero budget would reject every program.
    #[error("execution budget must be at least 1")]
    ZeroBudget,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings shared by every run of a [`Vm`](crate::vm::Vm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum commands per run.
    pub budget: u64,
    /// Run the peephole optimizer over decoded programs.
    pub optimize: bool,
    /// Replace recognized standard filter programs by native code.
    pub native_filters: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            optimize: true,
            native_filters: true,
        }
    }
}

impl VmConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: VmConfig = serde_yaml::from_str(yaml)?;
        if config.budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        Ok(config)
    }

    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_native_filters(mut self, native_filters: bool) -> Self {
        self.native_filters = native_filters;
        self
    }

    /// Preparer settings implied by this configuration.
    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            recognize_standard: self.native_filters,
            optimize: self.optimize,
        }
    }
}
