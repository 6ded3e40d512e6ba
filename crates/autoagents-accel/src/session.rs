//! Session building: container opening, session construction and input
//! binding allocation.

use crate::error::{AdapterError, Result};
use crate::runtime::BackendKind;
use crate::sdk::{AcceleratorSdk, ExecutableSession, Tensor, TensorMap};
use crate::source::ContainerSource;

/// A built session together with everything bound at load time.
///
/// Values of this type are only ever produced complete; the adapter swaps
/// one in as a whole, so a failed load cannot leave partial state behind.
pub struct LoadedSession<S> {
    session: S,
    backend: BackendKind,
    bindings: Vec<(String, Tensor)>,
    output_names: Vec<String>,
}

impl<S: ExecutableSession> LoadedSession<S> {
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Pre-bound input tensors, one per load-time input name, in that order.
    pub fn bindings(&self) -> &[(String, Tensor)] {
        &self.bindings
    }

    pub fn binding_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }

    /// Name-keyed view of the bindings handed to the SDK.
    ///
    /// A name bound more than once feeds the SDK its last tensor.
    pub(crate) fn binding_map(&self) -> TensorMap {
        self.bindings
            .iter()
            .map(|(name, tensor)| (name.clone(), tensor.clone()))
            .collect()
    }

    pub(crate) fn bindings_mut(&mut self) -> &mut [(String, Tensor)] {
        &mut self.bindings
    }

    /// Output filter supplied at load time.
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

/// Open a container and build a session with its input bindings.
pub fn build_session<Sdk: AcceleratorSdk + ?Sized>(
    sdk: &Sdk,
    backend: BackendKind,
    source: &ContainerSource,
    output_names: &[String],
    input_names: &[String],
) -> Result<LoadedSession<Sdk::Session>> {
    let container = sdk.open_container(source).map_err(|err| {
        log::error!("Failed to open {} container: {err}", source.describe());
        AdapterError::ContainerOpen {
            source_desc: source.describe(),
            reason: err.to_string(),
        }
    })?;

    let session = sdk
        .build_session(&container, output_names, backend)
        .map_err(|err| {
            log::error!("Failed to build session on {backend}: {err}");
            AdapterError::SessionBuild {
                backend,
                reason: err.to_string(),
            }
        })?;
    // The container is only needed to build the session.
    drop(container);

    let bindings = bind_inputs(sdk, &session, input_names)?;
    log::debug!(
        "Built session on {backend} with {} bound inputs and {} requested outputs",
        bindings.len(),
        output_names.len()
    );

    Ok(LoadedSession {
        session,
        backend,
        bindings,
        output_names: output_names.to_vec(),
    })
}

/// Allocate one tensor per input name, shaped by the session.
fn bind_inputs<Sdk: AcceleratorSdk + ?Sized>(
    sdk: &Sdk,
    session: &Sdk::Session,
    input_names: &[String],
) -> Result<Vec<(String, Tensor)>> {
    let mut bindings = Vec::with_capacity(input_names.len());
    for name in input_names {
        let shape = session.input_shape(Some(name)).ok_or_else(|| {
            log::error!("Cannot get input shape for input name: {name}");
            AdapterError::InputShape { name: name.clone() }
        })?;
        let tensor = sdk.create_tensor(&shape).map_err(|err| {
            log::error!("Cannot create tensor for input {name}: {err}");
            AdapterError::TensorAllocation {
                name: name.clone(),
                reason: err.to_string(),
            }
        })?;
        bindings.push((name.clone(), tensor));
    }
    Ok(bindings)
}
