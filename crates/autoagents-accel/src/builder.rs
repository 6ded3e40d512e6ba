use crate::{
    AdapterConfig, AdapterConfigBuilder, ContainerSource, DevicePolicyTable, InferenceAdapter,
    error::Result, sdk::AcceleratorSdk,
};
use std::marker::PhantomData;

/// Builder for InferenceAdapter.
pub struct InferenceAdapterBuilder<S: AcceleratorSdk> {
    config_builder: AdapterConfigBuilder,
    phantom: PhantomData<fn() -> S>,
}

impl<S: AcceleratorSdk> Default for InferenceAdapterBuilder<S> {
    fn default() -> Self {
        Self {
            config_builder: AdapterConfigBuilder::default(),
            phantom: PhantomData,
        }
    }
}

impl<S: AcceleratorSdk> InferenceAdapterBuilder<S> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the container source.
    pub fn container(mut self, source: ContainerSource) -> Self {
        self.config_builder = self.config_builder.container(source);
        self
    }

    /// Set the container file path.
    pub fn container_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config_builder = self.config_builder.container_path(path);
        self
    }

    /// Set an in-memory container.
    pub fn container_bytes(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.config_builder = self.config_builder.container_bytes(data);
        self
    }

    /// Prefer the fixed-point accelerator paths.
    pub fn prefer_accelerator(mut self, prefer: bool) -> Self {
        self.config_builder = self.config_builder.prefer_accelerator(prefer);
        self
    }

    /// Set the output name filter.
    pub fn output_names<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.config_builder = self.config_builder.output_names(names);
        self
    }

    /// Set the inputs to pre-bind.
    pub fn input_names<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.config_builder = self.config_builder.input_names(names);
        self
    }

    /// Replace the device policy tables.
    pub fn device_policy(mut self, table: DevicePolicyTable) -> Self {
        self.config_builder = self.config_builder.device_policy(table);
        self
    }

    /// Build the configuration without loading anything.
    pub fn config(self) -> AdapterConfig {
        self.config_builder.build()
    }

    /// Build the adapter and load its container.
    pub fn build(self, sdk: S) -> Result<InferenceAdapter<S>> {
        InferenceAdapter::from_config(sdk, self.config_builder.build())
    }
}
