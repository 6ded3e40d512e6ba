//! Configuration structures for the accelerator adapter.

use crate::device::DevicePolicyTable;
use crate::source::ContainerSource;
use serde::{Deserialize, Serialize};

/// Complete configuration for [`crate::InferenceAdapter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Model container to load.
    pub container: ContainerSource,

    /// Prefer the fixed-point accelerator/DSP paths when the device allows it.
    #[serde(default = "default_prefer_accelerator")]
    pub prefer_accelerator: bool,

    /// Outputs the session should materialize, in the order callers expect
    /// them. Empty selects the container's default outputs.
    #[serde(default)]
    pub output_names: Vec<String>,

    /// Inputs to pre-bind for multi-input execution, in positional order.
    #[serde(default)]
    pub input_names: Vec<String>,

    /// Device allow/deny tables used for backend selection.
    #[serde(default)]
    pub device_policy: DevicePolicyTable,
}

fn default_prefer_accelerator() -> bool {
    true
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            container: ContainerSource::default(),
            prefer_accelerator: default_prefer_accelerator(),
            output_names: Vec::new(),
            input_names: Vec::new(),
            device_policy: DevicePolicyTable::default(),
        }
    }
}

impl AdapterConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Builder for AdapterConfig.
#[derive(Debug)]
pub struct AdapterConfigBuilder {
    config: AdapterConfig,
}

impl AdapterConfigBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: AdapterConfig::default(),
        }
    }

    /// Set the container source.
    pub fn container(mut self, source: ContainerSource) -> Self {
        self.config.container = source;
        self
    }

    /// Load the container from a file.
    pub fn container_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.container = ContainerSource::file(path);
        self
    }

    /// Load the container from memory.
    pub fn container_bytes(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.config.container = ContainerSource::bytes(data);
        self
    }

    /// Set the accelerator preference.
    pub fn prefer_accelerator(mut self, prefer: bool) -> Self {
        self.config.prefer_accelerator = prefer;
        self
    }

    /// Set the output name filter.
    pub fn output_names<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.config.output_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the inputs to pre-bind.
    pub fn input_names<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.config.input_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the device policy tables.
    pub fn device_policy(mut self, table: DevicePolicyTable) -> Self {
        self.config.device_policy = table;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> AdapterConfig {
        self.config
    }
}

impl Default for AdapterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
