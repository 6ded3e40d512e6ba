//! # AutoAgents Accelerator Backend
//!
//! Inference adapter for vendor accelerator SDKs (dedicated AI accelerator,
//! DSP, mobile GPU, CPU) on edge devices.
//!
//! ## Features
//!
//! - **Device Policy**: Data-driven allow/deny tables keyed by manufacturer and model
//! - **Runtime Selection**: Fixed preference order over the SDK's available backends
//! - **Session Loading**: Containers from a file or memory, with output filters and pre-bound inputs
//! - **Execution**: Raw float32 byte buffers in and out with strict size checks
//! - **Fault Containment**: SDK failures and panics surface as [`AdapterError`] values
//! - **CSR Conversion**: Dense to compressed sparse row transforms for 2-D tensors
//!
//! The SDK itself is supplied by the caller through [`AcceleratorSdk`].

pub mod adapter;
pub mod builder;
pub mod config;
pub mod device;
pub mod error;
pub mod runtime;
pub mod sdk;
pub mod session;
pub mod source;
pub mod sparse;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports for convenience
pub use adapter::{AcceleratedInference, InferenceAdapter};
pub use builder::InferenceAdapterBuilder;
pub use config::{AdapterConfig, AdapterConfigBuilder};
pub use device::{DeviceIdentity, DevicePolicy, DevicePolicyTable, DeviceRule};
pub use error::{AdapterError, Result, SdkError};
pub use runtime::{BackendKind, RuntimeSelector, select_backend};
pub use sdk::{AcceleratorSdk, ExecutableSession, Tensor, TensorMap, TensorShape};
pub use source::ContainerSource;
pub use sparse::{CsrMatrix, SparseError, csr_to_dense, dense_to_csr};
