//! Scripted in-memory SDK used by unit tests.

use crate::error::SdkError;
use crate::runtime::BackendKind;
use crate::sdk::{AcceleratorSdk, ExecutableSession, Tensor, TensorMap, TensorShape};
use crate::source::ContainerSource;
use std::cell::Cell;

/// Model description served for a container source.
#[derive(Debug, Clone)]
pub(crate) struct MockModel {
    pub inputs: Vec<(String, TensorShape)>,
    pub outputs: Vec<(String, TensorShape)>,
}

impl MockModel {
    pub fn new(inputs: Vec<(&str, Vec<usize>)>, outputs: Vec<(&str, Vec<usize>)>) -> Self {
        let convert = |entries: Vec<(&str, Vec<usize>)>| {
            entries
                .into_iter()
                .map(|(name, dims)| (name.to_string(), TensorShape::new(dims)))
                .collect()
        };
        Self {
            inputs: convert(inputs),
            outputs: convert(outputs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    None,
    Fail,
    Empty,
    Panic,
}

pub(crate) struct MockSdk {
    pub available: Vec<BackendKind>,
    pub containers: Vec<(ContainerSource, MockModel)>,
    pub fault: Fault,
    pub fail_allocation: bool,
    pub opened: Cell<usize>,
}

impl MockSdk {
    pub fn new() -> Self {
        Self {
            available: vec![BackendKind::CpuFp32],
            containers: Vec::new(),
            fault: Fault::None,
            fail_allocation: false,
            opened: Cell::new(0),
        }
    }

    pub fn with_container(mut self, source: ContainerSource, model: MockModel) -> Self {
        self.containers.push((source, model));
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }
}

impl AcceleratorSdk for MockSdk {
    type Container = MockModel;
    type Session = MockSession;

    fn library_version(&self) -> String {
        "mock-1.0".to_string()
    }

    fn is_runtime_available(&self, backend: BackendKind) -> bool {
        self.available.contains(&backend)
    }

    fn open_container(&self, source: &ContainerSource) -> Result<MockModel, SdkError> {
        self.opened.set(self.opened.get() + 1);
        self.containers
            .iter()
            .find(|(known, _)| known == source)
            .map(|(_, model)| model.clone())
            .ok_or_else(|| SdkError::new("corrupt container"))
    }

    fn build_session(
        &self,
        container: &MockModel,
        output_names: &[String],
        backend: BackendKind,
    ) -> Result<MockSession, SdkError> {
        if !self.available.contains(&backend) && backend != BackendKind::Cpu {
            return Err(SdkError::new(format!("{backend} not supported")));
        }
        let mut model = container.clone();
        if !output_names.is_empty() {
            if let Some(missing) = output_names
                .iter()
                .find(|name| !model.outputs.iter().any(|(known, _)| known == *name))
            {
                return Err(SdkError::new(format!("unknown output {missing}")));
            }
            // Keep the container's own order, like a real SDK would.
            model
                .outputs
                .retain(|(name, _)| output_names.contains(name));
        }
        Ok(MockSession {
            model,
            fault: self.fault,
            runs: 0,
        })
    }

    fn create_tensor(&self, shape: &TensorShape) -> Result<Tensor, SdkError> {
        if self.fail_allocation {
            return Err(SdkError::new("out of device memory"));
        }
        Ok(Tensor::zeros(shape.clone()))
    }
}

/// Session whose outputs are `(k + 1) * sum(inputs)` for output `k`.
pub(crate) struct MockSession {
    model: MockModel,
    fault: Fault,
    /// Forward passes started on this session.
    pub runs: usize,
}

impl MockSession {
    fn produce(&self, total: f32) -> Result<TensorMap, SdkError> {
        match self.fault {
            Fault::Fail => return Err(SdkError::new("kernel failure")),
            Fault::Empty => return Ok(TensorMap::new()),
            Fault::Panic => panic!("kernel fault"),
            Fault::None => {}
        }
        let mut outputs = TensorMap::new();
        for (k, (name, shape)) in self.model.outputs.iter().enumerate() {
            let value = (k + 1) as f32 * total;
            let tensor = Tensor::from_vec(shape.clone(), vec![value; shape.element_count()])?;
            outputs.insert(name.clone(), tensor);
        }
        Ok(outputs)
    }
}

impl ExecutableSession for MockSession {
    fn input_shape(&self, name: Option<&str>) -> Option<TensorShape> {
        match name {
            None => self.model.inputs.first().map(|(_, shape)| shape.clone()),
            Some(name) => self
                .model
                .inputs
                .iter()
                .find(|(known, _)| known == name)
                .map(|(_, shape)| shape.clone()),
        }
    }

    fn input_names(&self) -> Option<Vec<String>> {
        Some(self.model.inputs.iter().map(|(name, _)| name.clone()).collect())
    }

    fn execute(&mut self, input: &Tensor) -> Result<TensorMap, SdkError> {
        self.runs += 1;
        self.produce(input.as_slice().iter().sum())
    }

    fn execute_map(&mut self, inputs: &TensorMap) -> Result<TensorMap, SdkError> {
        self.runs += 1;
        let mut total = 0.0;
        for (name, tensor) in inputs.iter() {
            if self.input_shape(Some(name)).as_ref() != Some(tensor.shape()) {
                return Err(SdkError::new(format!("unexpected input {name}")));
            }
            total += tensor.as_slice().iter().sum::<f32>();
        }
        self.produce(total)
    }
}

/// Native-endian bytes of a float slice.
pub(crate) fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Floats decoded from native-endian bytes.
pub(crate) fn bytes_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
