//! Accelerator SDK boundary.
//!
//! The SDK (container parser, session builder, execution kernels) is an
//! external collaborator. This module defines the capabilities the adapter
//! needs from it and the float32 tensor types exchanged across the boundary.

use crate::error::SdkError;
use crate::runtime::BackendKind;
use crate::source::ContainerSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Size in bytes of one tensor element.
pub const ELEMENT_SIZE: usize = std::mem::size_of::<f32>();

/// Dimensions of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TensorShape(Vec<usize>);

impl TensorShape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of elements; a rank-0 shape holds one element.
    pub fn element_count(&self) -> usize {
        self.0.iter().product()
    }

    /// Number of bytes occupied by the float32 elements.
    pub fn byte_len(&self) -> usize {
        self.element_count() * ELEMENT_SIZE
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl From<&[usize]> for TensorShape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Owned float32 tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: TensorShape,
    data: Vec<f32>,
}

impl Tensor {
    /// Zero-filled tensor of the given shape.
    pub fn zeros(shape: TensorShape) -> Self {
        let data = vec![0.0; shape.element_count()];
        Self { shape, data }
    }

    /// Tensor over existing values; the length must match the shape.
    pub fn from_vec(shape: TensorShape, data: Vec<f32>) -> Result<Self, SdkError> {
        if data.len() != shape.element_count() {
            return Err(SdkError::new(format!(
                "tensor of shape {shape} needs {} elements, got {}",
                shape.element_count(),
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len() * ELEMENT_SIZE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Raw native-endian view of the backing storage.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.data.as_slice())
    }

    /// Overwrite the backing storage with raw bytes.
    ///
    /// `bytes` must be exactly [`Tensor::byte_len`] long.
    pub fn copy_from_bytes(&mut self, bytes: &[u8]) -> Result<(), SdkError> {
        if bytes.len() != self.byte_len() {
            return Err(SdkError::new(format!(
                "expected {} bytes, got {}",
                self.byte_len(),
                bytes.len()
            )));
        }
        bytemuck::cast_slice_mut::<f32, u8>(self.data.as_mut_slice()).copy_from_slice(bytes);
        Ok(())
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Name to tensor map that keeps insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorMap {
    entries: Vec<(String, Tensor)>,
}

impl TensorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tensor, replacing any existing entry with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = tensor,
            None => self.entries.push((name, tensor)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, tensor)| tensor)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tensor> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| existing == name)
            .map(|(_, tensor)| tensor)
    }

    /// Tensor at a position in insertion order.
    pub fn get_index(&self, index: usize) -> Option<(&str, &Tensor)> {
        self.entries
            .get(index)
            .map(|(name, tensor)| (name.as_str(), tensor))
    }

    pub fn get_index_mut(&mut self, index: usize) -> Option<(&str, &mut Tensor)> {
        self.entries
            .get_mut(index)
            .map(|(name, tensor)| (name.as_str(), tensor))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries
            .iter()
            .map(|(name, tensor)| (name.as_str(), tensor))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Tensor)> for TensorMap {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        let mut map = TensorMap::new();
        for (name, tensor) in iter {
            map.insert(name, tensor);
        }
        map
    }
}

/// Capabilities required from the accelerator SDK.
pub trait AcceleratorSdk {
    /// Opened model container.
    type Container;
    /// Executable session built from a container.
    type Session: ExecutableSession;

    /// Version string of the linked SDK library.
    fn library_version(&self) -> String;

    /// Whether a backend can run on this host. Must be fast and side-effect free.
    fn is_runtime_available(&self, backend: BackendKind) -> bool;

    /// Open and parse a model container.
    fn open_container(&self, source: &ContainerSource) -> Result<Self::Container, SdkError>;

    /// Build a session bound to `backend`.
    ///
    /// An empty `output_names` selects the container's default outputs.
    fn build_session(
        &self,
        container: &Self::Container,
        output_names: &[String],
        backend: BackendKind,
    ) -> Result<Self::Session, SdkError>;

    /// Allocate a tensor for the given shape.
    fn create_tensor(&self, shape: &TensorShape) -> Result<Tensor, SdkError> {
        Ok(Tensor::zeros(shape.clone()))
    }
}

/// Session produced by [`AcceleratorSdk::build_session`].
pub trait ExecutableSession {
    /// Shape of a named input, or of the default input when `name` is `None`.
    fn input_shape(&self, name: Option<&str>) -> Option<TensorShape>;

    /// Input names in the session's declared order.
    fn input_names(&self) -> Option<Vec<String>>;

    /// Run the forward pass on the default input.
    fn execute(&mut self, input: &Tensor) -> Result<TensorMap, SdkError>;

    /// Run the forward pass on a set of named inputs.
    fn execute_map(&mut self, inputs: &TensorMap) -> Result<TensorMap, SdkError>;
}

impl<S: AcceleratorSdk + ?Sized> AcceleratorSdk for Arc<S> {
    type Container = S::Container;
    type Session = S::Session;

    fn library_version(&self) -> String {
        (**self).library_version()
    }

    fn is_runtime_available(&self, backend: BackendKind) -> bool {
        (**self).is_runtime_available(backend)
    }

    fn open_container(&self, source: &ContainerSource) -> Result<Self::Container, SdkError> {
        (**self).open_container(source)
    }

    fn build_session(
        &self,
        container: &Self::Container,
        output_names: &[String],
        backend: BackendKind,
    ) -> Result<Self::Session, SdkError> {
        (**self).build_session(container, output_names, backend)
    }

    fn create_tensor(&self, shape: &TensorShape) -> Result<Tensor, SdkError> {
        (**self).create_tensor(shape)
    }
}
