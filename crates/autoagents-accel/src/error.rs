//! Error types for the accelerator adapter.

use crate::runtime::BackendKind;
use thiserror::Error;

/// Failure reported by the accelerator SDK.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SdkError {
    message: String,
}

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by the adapter's load and execute operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// The model container could not be opened or parsed.
    #[error("Failed to open container {source_desc}: {reason}")]
    ContainerOpen { source_desc: String, reason: String },

    /// The SDK could not build a session for the selected backend.
    #[error("Failed to build session on {backend}: {reason}")]
    SessionBuild { backend: BackendKind, reason: String },

    /// A named input's shape could not be resolved by the session.
    #[error("Cannot resolve input shape for {name}")]
    InputShape { name: String },

    /// The SDK tensor factory failed to allocate a tensor.
    #[error("Cannot create tensor for {name}: {reason}")]
    TensorAllocation { name: String, reason: String },

    /// A caller buffer disagrees with the tensor it maps to.
    #[error("Size mismatch for {tensor}: expected {expected} bytes, given {given} bytes")]
    SizeMismatch {
        tensor: String,
        expected: usize,
        given: usize,
    },

    /// The number of input buffers differs from the bound inputs.
    #[error("Input count mismatch: {expected} inputs bound, {given} given")]
    InputCount { expected: usize, given: usize },

    /// The forward pass failed or produced no usable outputs.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// A lower layer faulted; the fault was contained at the adapter boundary.
    #[error("Unexpected failure in {operation}: {reason}")]
    Unexpected { operation: String, reason: String },

    /// An execute call was made before any successful load.
    #[error("No session loaded")]
    NotLoaded,
}

impl AdapterError {
    pub(crate) fn size_mismatch(tensor: impl Into<String>, expected: usize, given: usize) -> Self {
        Self::SizeMismatch {
            tensor: tensor.into(),
            expected,
            given,
        }
    }

    pub(crate) fn unexpected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unexpected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised by a load-time step.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            AdapterError::ContainerOpen { .. }
                | AdapterError::SessionBuild { .. }
                | AdapterError::InputShape { .. }
                | AdapterError::TensorAllocation { .. }
        )
    }
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Run an operation that calls into the SDK, turning a panic into
/// [`AdapterError::Unexpected`].
pub(crate) fn contain<T>(operation: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("SDK faulted during {operation}: {reason}");
            Err(AdapterError::unexpected(operation, reason))
        }
    }
}
