//! InferenceAdapter: the load and execute surface over an accelerator SDK.

use crate::{
    builder::InferenceAdapterBuilder,
    config::AdapterConfig,
    device::{self, DevicePolicy},
    error::{AdapterError, Result, contain},
    runtime::{BackendKind, RuntimeSelector},
    sdk::{AcceleratorSdk, ExecutableSession, Tensor, TensorMap},
    session::{LoadedSession, build_session},
    source::ContainerSource,
};
use std::path::PathBuf;

/// Load and execute operations shared by accelerator-backed adapters.
pub trait AcceleratedInference {
    /// Replace the active session with one built from `source`.
    fn load(
        &mut self,
        source: &ContainerSource,
        output_names: &[String],
        input_names: &[String],
    ) -> Result<()>;

    /// Dimensions of input `index`; index 0 is the default input.
    fn input_dimensions(&self, index: usize) -> Result<Vec<usize>>;

    /// Run one input buffer through the network into one output buffer.
    fn execute(&mut self, input: &[u8], output: &mut [u8]) -> Result<()>;

    /// Run one input buffer through the network into several output buffers.
    fn execute_multiple_outputs(&mut self, input: &[u8], outputs: &mut [&mut [u8]]) -> Result<()>;

    /// Run the pre-bound inputs through the network.
    fn execute_multiple_inputs(
        &mut self,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()>;
}

/// Accelerator inference adapter.
///
/// The backend is chosen once, at construction. Each successful
/// [`InferenceAdapter::load`] replaces the active session as a whole; a
/// failed load leaves the previous session untouched.
pub struct InferenceAdapter<S: AcceleratorSdk> {
    sdk: S,
    backend: BackendKind,
    policy: DevicePolicy,
    loaded: Option<LoadedSession<S::Session>>,
}

impl<S: AcceleratorSdk> InferenceAdapter<S> {
    /// Create an adapter for the running host using the built-in device tables.
    pub fn new(sdk: S, prefer_accelerator: bool) -> Self {
        Self::with_policy(sdk, device::classify(), prefer_accelerator)
    }

    /// Create an adapter with an explicit device policy.
    pub fn with_policy(sdk: S, policy: DevicePolicy, prefer_accelerator: bool) -> Self {
        let backend = RuntimeSelector::new(&sdk, policy).select(prefer_accelerator);
        Self {
            sdk,
            backend,
            policy,
            loaded: None,
        }
    }

    /// Create an adapter and load the configured container.
    ///
    /// A load failure is returned instead of an unusable adapter.
    pub fn from_config(sdk: S, config: AdapterConfig) -> Result<Self> {
        let policy = config.device_policy.classify_host();
        let mut adapter = Self::with_policy(sdk, policy, config.prefer_accelerator);
        adapter.load(&config.container, &config.output_names, &config.input_names)?;
        Ok(adapter)
    }

    /// Create a builder; the SDK is supplied to [`InferenceAdapterBuilder::build`].
    pub fn builder() -> InferenceAdapterBuilder<S> {
        InferenceAdapterBuilder::new()
    }

    /// Create an adapter from a container file with default outputs.
    pub fn from_path(sdk: S, path: impl Into<PathBuf>, prefer_accelerator: bool) -> Result<Self> {
        Self::from_config(
            sdk,
            AdapterConfig {
                container: ContainerSource::file(path),
                prefer_accelerator,
                ..AdapterConfig::default()
            },
        )
    }

    /// Create an adapter from an in-memory container with default outputs.
    pub fn from_bytes(sdk: S, data: impl Into<Vec<u8>>, prefer_accelerator: bool) -> Result<Self> {
        Self::from_config(
            sdk,
            AdapterConfig {
                container: ContainerSource::bytes(data),
                prefer_accelerator,
                ..AdapterConfig::default()
            },
        )
    }

    /// Backend every session of this adapter is built for.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Device policy the backend was selected under.
    pub fn policy(&self) -> DevicePolicy {
        self.policy
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Names of the pre-bound inputs, in positional order.
    pub fn input_binding_names(&self) -> Vec<&str> {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.binding_names().collect())
            .unwrap_or_default()
    }

    /// Output filter of the active session.
    pub fn output_names(&self) -> &[String] {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.output_names())
            .unwrap_or_default()
    }

    /// Build a session from `source` and make it the active one.
    pub fn load(
        &mut self,
        source: &ContainerSource,
        output_names: &[String],
        input_names: &[String],
    ) -> Result<()> {
        log::debug!(
            "Loading {} on {} with {} output names and {} input names",
            source.describe(),
            self.backend,
            output_names.len(),
            input_names.len()
        );
        let loaded = contain("load", || {
            build_session(&self.sdk, self.backend, source, output_names, input_names)
        })?;
        self.loaded = Some(loaded);
        log::info!("Loaded {} on {}", source.describe(), self.backend);
        Ok(())
    }

    /// Load from a container file.
    pub fn load_path(
        &mut self,
        path: impl Into<PathBuf>,
        output_names: &[String],
        input_names: &[String],
    ) -> Result<()> {
        self.load(&ContainerSource::file(path), output_names, input_names)
    }

    /// Load from an in-memory container.
    pub fn load_bytes(
        &mut self,
        data: impl Into<Vec<u8>>,
        output_names: &[String],
        input_names: &[String],
    ) -> Result<()> {
        self.load(&ContainerSource::bytes(data), output_names, input_names)
    }

    /// Dimensions of input `index`.
    ///
    /// Index 0 is the session's default input. Other indices refer to the
    /// session's declared input names.
    pub fn input_dimensions(&self, index: usize) -> Result<Vec<usize>> {
        let loaded = self.loaded.as_ref().ok_or(AdapterError::NotLoaded)?;
        contain("input_dimensions", || {
            let session = loaded.session();
            let (label, shape) = if index == 0 {
                ("default input".to_string(), session.input_shape(None))
            } else {
                let names = session.input_names().unwrap_or_default();
                let name = names.get(index).ok_or_else(|| {
                    log::error!(
                        "Input index {index} out of range, session declares {} inputs",
                        names.len()
                    );
                    AdapterError::InputShape {
                        name: format!("input {index}"),
                    }
                })?;
                (name.clone(), session.input_shape(Some(name)))
            };
            shape.map(|shape| shape.dims().to_vec()).ok_or_else(|| {
                log::error!("Cannot get input shape for {label}");
                AdapterError::InputShape { name: label }
            })
        })
    }

    /// Run `input` through the network into a single output buffer.
    pub fn execute(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        self.execute_multiple_outputs(input, &mut [output])
    }

    /// Run `input` through the network.
    ///
    /// `input` must be exactly the byte size of the default input tensor.
    /// Output `i` receives the `i`-th output tensor and must be at least as
    /// large as it; only the tensor's bytes are written. Outputs before the
    /// first undersized one are already written when that error is returned.
    pub fn execute_multiple_outputs(
        &mut self,
        input: &[u8],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        let sdk = &self.sdk;
        let loaded = self.loaded.as_mut().ok_or_else(|| {
            log::error!("Execute called before a session was loaded");
            AdapterError::NotLoaded
        })?;
        contain("execute", || {
            let shape = loaded.session().input_shape(None).ok_or_else(|| {
                log::error!("Cannot get default input shape");
                AdapterError::InputShape {
                    name: "default input".to_string(),
                }
            })?;
            let mut tensor = sdk.create_tensor(&shape).map_err(|err| {
                log::error!("Cannot create input tensor of shape {shape}: {err}");
                AdapterError::TensorAllocation {
                    name: "default input".to_string(),
                    reason: err.to_string(),
                }
            })?;
            fill_tensor(&mut tensor, "input", input)?;

            let produced = loaded.session_mut().execute(&tensor).map_err(|err| {
                log::error!("Execution failed: {err}");
                AdapterError::Execution(err.to_string())
            })?;
            write_outputs(&produced, loaded.output_names(), outputs)
        })
    }

    /// Run the pre-bound inputs through the network.
    ///
    /// `inputs[i]` fills the `i`-th binding and must match its byte size
    /// exactly. Outputs follow [`InferenceAdapter::execute_multiple_outputs`].
    pub fn execute_multiple_inputs(
        &mut self,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        let loaded = self.loaded.as_mut().ok_or_else(|| {
            log::error!("Execute called before a session was loaded");
            AdapterError::NotLoaded
        })?;
        contain("execute_multiple_inputs", || {
            let bindings = loaded.bindings_mut();
            if inputs.len() != bindings.len() {
                log::error!(
                    "Input count incorrect: {} inputs bound, {} given",
                    bindings.len(),
                    inputs.len()
                );
                return Err(AdapterError::InputCount {
                    expected: bindings.len(),
                    given: inputs.len(),
                });
            }
            for ((name, tensor), input) in bindings.iter_mut().zip(inputs) {
                fill_tensor(tensor, name, input)?;
            }

            let feed = loaded.binding_map();
            let produced = loaded.session_mut().execute_map(&feed).map_err(|err| {
                log::error!("Execution failed: {err}");
                AdapterError::Execution(err.to_string())
            })?;
            write_outputs(&produced, loaded.output_names(), outputs)
        })
    }
}

impl<S: AcceleratorSdk> AcceleratedInference for InferenceAdapter<S> {
    fn load(
        &mut self,
        source: &ContainerSource,
        output_names: &[String],
        input_names: &[String],
    ) -> Result<()> {
        InferenceAdapter::load(self, source, output_names, input_names)
    }

    fn input_dimensions(&self, index: usize) -> Result<Vec<usize>> {
        InferenceAdapter::input_dimensions(self, index)
    }

    fn execute(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        InferenceAdapter::execute(self, input, output)
    }

    fn execute_multiple_outputs(&mut self, input: &[u8], outputs: &mut [&mut [u8]]) -> Result<()> {
        InferenceAdapter::execute_multiple_outputs(self, input, outputs)
    }

    fn execute_multiple_inputs(
        &mut self,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        InferenceAdapter::execute_multiple_inputs(self, inputs, outputs)
    }
}

/// Copy a caller buffer into a tensor whose byte size it must match exactly.
fn fill_tensor(tensor: &mut Tensor, name: &str, bytes: &[u8]) -> Result<()> {
    let expected = tensor.byte_len();
    if bytes.len() != expected {
        log::error!(
            "Input size incorrect: input_layer {name} expected {expected} bytes, given {} bytes",
            bytes.len()
        );
        return Err(AdapterError::size_mismatch(name, expected, bytes.len()));
    }
    tensor
        .copy_from_bytes(bytes)
        .map_err(|err| AdapterError::unexpected("input copy", err.to_string()))
}

/// Copy produced tensors into caller buffers, stopping at the first one
/// that is too small.
fn write_outputs(
    produced: &TensorMap,
    output_names: &[String],
    outputs: &mut [&mut [u8]],
) -> Result<()> {
    if produced.is_empty() {
        log::error!("Execution produced no outputs");
        return Err(AdapterError::Execution(
            "session produced no outputs".to_string(),
        ));
    }
    for (index, buffer) in outputs.iter_mut().enumerate() {
        let (name, tensor) = resolve_output(produced, output_names, index)?;
        let expected = tensor.byte_len();
        if expected > buffer.len() {
            log::error!(
                "Output size incorrect: output_layer {name} expected {expected} bytes, given {} bytes",
                buffer.len()
            );
            return Err(AdapterError::size_mismatch(name, expected, buffer.len()));
        }
        buffer[..expected].copy_from_slice(tensor.as_bytes());
    }
    Ok(())
}

/// The tensor feeding output buffer `index`.
///
/// With a load-time output filter, buffers follow the filter's order;
/// otherwise they follow the order the session produced.
fn resolve_output<'a>(
    produced: &'a TensorMap,
    output_names: &'a [String],
    index: usize,
) -> Result<(&'a str, &'a Tensor)> {
    if output_names.is_empty() {
        return produced.get_index(index).ok_or_else(|| {
            log::error!(
                "Requested output {index} but session produced {}",
                produced.len()
            );
            AdapterError::Execution(format!(
                "requested output {index} but session produced {}",
                produced.len()
            ))
        });
    }
    let name = output_names.get(index).ok_or_else(|| {
        log::error!(
            "Requested output {index} but only {} outputs were named at load",
            output_names.len()
        );
        AdapterError::Execution(format!(
            "requested output {index} but only {} outputs were named at load",
            output_names.len()
        ))
    })?;
    produced
        .get(name)
        .map(|tensor| (name.as_str(), tensor))
        .ok_or_else(|| {
            log::error!("Session did not produce output {name}");
            AdapterError::Execution(format!("session did not produce output {name}"))
        })
}
