use autoagents_accel::{
    AcceleratedInference, AcceleratorSdk, AdapterConfig, AdapterError, BackendKind,
    ContainerSource, DeviceIdentity, DevicePolicy, DevicePolicyTable, ExecutableSession,
    InferenceAdapter, SdkError, Tensor, TensorMap, TensorShape,
};
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;

const NEUTRAL: DevicePolicy = DevicePolicy {
    must_avoid_accelerator: false,
    accelerator_only: false,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Container format understood by [`JsonSdk`].
#[derive(Debug, Clone, Deserialize)]
struct JsonModel {
    inputs: Vec<(String, Vec<usize>)>,
    outputs: Vec<(String, Vec<usize>)>,
    #[serde(default)]
    panic_on_execute: bool,
}

/// SDK whose containers are JSON model descriptions.
///
/// Output `k` element `j` is `(k + 1) * s[j % len]`, where `s` is the
/// element-wise sum of all inputs.
struct JsonSdk {
    available: Vec<BackendKind>,
}

impl JsonSdk {
    fn new(available: &[BackendKind]) -> Self {
        Self {
            available: available.to_vec(),
        }
    }
}

impl AcceleratorSdk for JsonSdk {
    type Container = JsonModel;
    type Session = JsonSession;

    fn library_version(&self) -> String {
        "json-sdk 0.1".to_string()
    }

    fn is_runtime_available(&self, backend: BackendKind) -> bool {
        self.available.contains(&backend)
    }

    fn open_container(&self, source: &ContainerSource) -> Result<JsonModel, SdkError> {
        let data = match source {
            ContainerSource::File { path } => {
                std::fs::read(path).map_err(|err| SdkError::new(err.to_string()))?
            }
            ContainerSource::Bytes { data } => data.clone(),
        };
        serde_json::from_slice(&data).map_err(|err| SdkError::new(err.to_string()))
    }

    fn build_session(
        &self,
        container: &JsonModel,
        output_names: &[String],
        _backend: BackendKind,
    ) -> Result<JsonSession, SdkError> {
        let mut model = container.clone();
        if !output_names.is_empty() {
            model.outputs.retain(|(name, _)| output_names.contains(name));
            if model.outputs.len() != output_names.len() {
                return Err(SdkError::new("unknown output name"));
            }
        }
        Ok(JsonSession { model })
    }
}

struct JsonSession {
    model: JsonModel,
}

impl JsonSession {
    fn run<'a>(&self, inputs: impl Iterator<Item = &'a Tensor>) -> Result<TensorMap, SdkError> {
        if self.model.panic_on_execute {
            panic!("accelerator watchdog reset");
        }
        let mut sum: Vec<f32> = Vec::new();
        for tensor in inputs {
            for (index, value) in tensor.as_slice().iter().enumerate() {
                match sum.get_mut(index) {
                    Some(slot) => *slot += value,
                    None => sum.push(*value),
                }
            }
        }
        if sum.is_empty() {
            return Err(SdkError::new("no input data"));
        }

        let mut outputs = TensorMap::new();
        for (k, (name, dims)) in self.model.outputs.iter().enumerate() {
            let shape = TensorShape::new(dims.clone());
            let data = (0..shape.element_count())
                .map(|j| (k + 1) as f32 * sum[j % sum.len()])
                .collect();
            outputs.insert(name.clone(), Tensor::from_vec(shape, data)?);
        }
        Ok(outputs)
    }
}

impl ExecutableSession for JsonSession {
    fn input_shape(&self, name: Option<&str>) -> Option<TensorShape> {
        let entry = match name {
            None => self.model.inputs.first(),
            Some(name) => self.model.inputs.iter().find(|(known, _)| known == name),
        };
        entry.map(|(_, dims)| TensorShape::new(dims.clone()))
    }

    fn input_names(&self) -> Option<Vec<String>> {
        Some(self.model.inputs.iter().map(|(name, _)| name.clone()).collect())
    }

    fn execute(&mut self, input: &Tensor) -> Result<TensorMap, SdkError> {
        self.run(std::iter::once(input))
    }

    fn execute_map(&mut self, inputs: &TensorMap) -> Result<TensorMap, SdkError> {
        self.run(inputs.iter().map(|(_, tensor)| tensor))
    }
}

const CLASSIFIER: &str = r#"{
    "inputs": [["image", [10, 1]]],
    "outputs": [["probs", [10]]]
}"#;

const DETECTOR: &str = r#"{
    "inputs": [["image", [4]], ["mask", [4]], ["prior", [2]]],
    "outputs": [["scores", [2]], ["boxes", [4]], ["classes", [3]]]
}"#;

const FAULTY: &str = r#"{
    "inputs": [["image", [2]]],
    "outputs": [["probs", [2]]],
    "panic_on_execute": true
}"#;

fn cpu_sdk() -> JsonSdk {
    JsonSdk::new(&[BackendKind::CpuFp32])
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn bytes_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn adapter_with(container: &str, outputs: &[&str], inputs: &[&str]) -> InferenceAdapter<JsonSdk> {
    let mut adapter = InferenceAdapter::with_policy(cpu_sdk(), NEUTRAL, true);
    adapter
        .load_bytes(container.as_bytes(), &names(outputs), &names(inputs))
        .unwrap();
    adapter
}

#[test]
fn test_load_from_file() {
    init_logger();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CLASSIFIER.as_bytes()).unwrap();

    let adapter = InferenceAdapter::from_path(cpu_sdk(), file.path(), false).unwrap();
    assert!(adapter.is_loaded());
    assert_eq!(adapter.backend(), BackendKind::CpuFp32);
    assert_eq!(adapter.input_dimensions(0).unwrap(), vec![10, 1]);
}

#[test]
fn test_missing_file_fails_construction() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let err = InferenceAdapter::from_path(cpu_sdk(), dir.path().join("absent.dlc"), false)
        .err()
        .unwrap();
    assert!(matches!(err, AdapterError::ContainerOpen { .. }));
}

#[test]
fn test_failed_load_keeps_previous_session() {
    init_logger();
    let mut adapter = adapter_with(DETECTOR, &[], &["image", "mask"]);

    let corrupt = adapter.load_bytes(b"{ not json".to_vec(), &[], &names(&["prior"]));
    assert!(corrupt.unwrap_err().is_load_error());
    let unknown_input = adapter.load_bytes(DETECTOR.as_bytes(), &[], &names(&["depth"]));
    assert_eq!(
        unknown_input,
        Err(AdapterError::InputShape {
            name: "depth".to_string()
        })
    );

    assert_eq!(adapter.input_binding_names(), vec!["image", "mask"]);
    let image = f32_bytes(&[1.0; 4]);
    let mask = f32_bytes(&[2.0; 4]);
    let mut scores = vec![0u8; 8];
    adapter
        .execute_multiple_inputs(
            &[image.as_slice(), mask.as_slice()],
            &mut [scores.as_mut_slice()],
        )
        .unwrap();
    assert_eq!(bytes_f32(&scores), vec![3.0; 2]);
}

#[test]
fn test_reload_replaces_all_bindings() {
    init_logger();
    let mut adapter = adapter_with(DETECTOR, &[], &["image", "mask", "prior"]);
    assert_eq!(adapter.input_binding_names().len(), 3);

    adapter
        .load_bytes(DETECTOR.as_bytes(), &[], &names(&["prior"]))
        .unwrap();
    assert_eq!(adapter.input_binding_names(), vec!["prior"]);

    let image = f32_bytes(&[1.0; 4]);
    let mut scores = vec![0u8; 8];
    assert_eq!(
        adapter.execute_multiple_inputs(
            &[image.as_slice(), image.as_slice()],
            &mut [scores.as_mut_slice()]
        ),
        Err(AdapterError::InputCount {
            expected: 1,
            given: 2
        })
    );
}

#[test]
fn test_one_byte_short_input() {
    init_logger();
    let mut adapter = adapter_with(CLASSIFIER, &[], &[]);
    let mut output = vec![0x5Au8; 40];

    let err = adapter.execute(&[0u8; 39], &mut output).unwrap_err();
    assert_eq!(
        err,
        AdapterError::SizeMismatch {
            tensor: "input".to_string(),
            expected: 40,
            given: 39,
        }
    );
    assert!(err.to_string().contains("expected 40 bytes, given 39 bytes"));
    assert!(output.iter().all(|b| *b == 0x5A));

    let input: Vec<f32> = (0..10).map(|v| v as f32).collect();
    adapter.execute(&f32_bytes(&input), &mut output).unwrap();
    assert_eq!(bytes_f32(&output), input);
}

#[test]
fn test_partial_writes_before_undersized_output() {
    init_logger();
    let mut adapter = adapter_with(DETECTOR, &[], &[]);
    let input = f32_bytes(&[1.0, 2.0, 3.0, 4.0]);

    let mut scores = vec![0u8; 8];
    let mut boxes = vec![0u8; 15];
    let mut classes = vec![0u8; 12];
    let err = adapter
        .execute_multiple_outputs(
            &input,
            &mut [
                scores.as_mut_slice(),
                boxes.as_mut_slice(),
                classes.as_mut_slice(),
            ],
        )
        .unwrap_err();

    assert_eq!(
        err,
        AdapterError::SizeMismatch {
            tensor: "boxes".to_string(),
            expected: 16,
            given: 15,
        }
    );
    assert_eq!(bytes_f32(&scores), vec![1.0, 2.0]);
    assert!(boxes.iter().all(|b| *b == 0));
    assert!(classes.iter().all(|b| *b == 0));
}

#[test]
fn test_outputs_follow_load_time_names() {
    init_logger();
    let mut adapter = adapter_with(DETECTOR, &["classes", "scores"], &[]);
    assert_eq!(adapter.output_names(), names(&["classes", "scores"]).as_slice());

    let mut classes = vec![0u8; 12];
    let mut scores = vec![0u8; 8];
    adapter
        .execute_multiple_outputs(
            &f32_bytes(&[1.0, 1.0, 1.0, 1.0]),
            &mut [classes.as_mut_slice(), scores.as_mut_slice()],
        )
        .unwrap();
    // The session produces scores first (k = 0) and classes second (k = 1).
    assert_eq!(bytes_f32(&classes), vec![2.0; 3]);
    assert_eq!(bytes_f32(&scores), vec![1.0; 2]);
}

#[test]
fn test_sdk_panic_is_contained() {
    init_logger();
    let mut adapter = adapter_with(FAULTY, &[], &[]);
    let mut output = vec![0u8; 8];
    let err = adapter
        .execute(&f32_bytes(&[1.0, 2.0]), &mut output)
        .unwrap_err();
    assert_eq!(
        err,
        AdapterError::Unexpected {
            operation: "execute".to_string(),
            reason: "accelerator watchdog reset".to_string(),
        }
    );
    assert!(adapter.is_loaded());
}

#[test]
fn test_execute_without_session() {
    init_logger();
    let mut adapter = InferenceAdapter::new(cpu_sdk(), false);
    let mut output = vec![0u8; 4];
    assert_eq!(
        adapter.execute(&[0u8; 4], &mut output),
        Err(AdapterError::NotLoaded)
    );
}

#[test]
fn test_from_config_json() {
    init_logger();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DETECTOR.as_bytes()).unwrap();
    let json = serde_json::json!({
        "container": { "File": { "path": file.path() } },
        "prefer_accelerator": false,
        "output_names": ["boxes"],
        "input_names": ["image", "mask", "prior"],
    });
    let config = AdapterConfig::from_json(&json.to_string()).unwrap();

    let mut adapter = InferenceAdapter::from_config(cpu_sdk(), config).unwrap();
    assert_eq!(adapter.input_binding_names(), vec!["image", "mask", "prior"]);

    let image = f32_bytes(&[1.0; 4]);
    let prior = f32_bytes(&[1.0; 2]);
    let mut boxes = vec![0u8; 16];
    adapter
        .execute_multiple_inputs(
            &[image.as_slice(), image.as_slice(), prior.as_slice()],
            &mut [boxes.as_mut_slice()],
        )
        .unwrap();
    assert_eq!(bytes_f32(&boxes), vec![3.0, 3.0, 2.0, 2.0]);
}

#[test]
fn test_builder_and_trait_object() {
    init_logger();
    let adapter = InferenceAdapter::builder()
        .container_bytes(CLASSIFIER.as_bytes())
        .prefer_accelerator(false)
        .build(cpu_sdk())
        .unwrap();

    let mut adapter: Box<dyn AcceleratedInference> = Box::new(adapter);
    let mut output = vec![0u8; 40];
    adapter.execute(&f32_bytes(&[0.5; 10]), &mut output).unwrap();
    assert_eq!(bytes_f32(&output), vec![0.5; 10]);
}

#[test]
fn test_shared_sdk_across_adapters() {
    init_logger();
    let sdk = Arc::new(cpu_sdk());
    let mut first = InferenceAdapter::with_policy(Arc::clone(&sdk), NEUTRAL, true);
    let mut second = InferenceAdapter::with_policy(Arc::clone(&sdk), NEUTRAL, true);
    first.load_bytes(CLASSIFIER.as_bytes(), &[], &[]).unwrap();
    second.load_bytes(FAULTY.as_bytes(), &[], &[]).unwrap();

    assert_eq!(first.input_dimensions(0).unwrap(), vec![10, 1]);
    assert_eq!(second.input_dimensions(0).unwrap(), vec![2]);
}

#[test]
fn test_device_scenarios_drive_backend() {
    init_logger();
    let table = DevicePolicyTable::default();
    let sdk = || JsonSdk::new(&[BackendKind::GpuFp16, BackendKind::CpuFp32]);

    let oneplus_7 = table.classify(Some(&DeviceIdentity::new("OnePlus", "GM1903")));
    let adapter = InferenceAdapter::with_policy(sdk(), oneplus_7, true);
    assert_eq!(adapter.backend(), BackendKind::Dsp);

    let oneplus_7_pro = table.classify(Some(&DeviceIdentity::new("OnePlus", "GM1925")));
    let adapter = InferenceAdapter::with_policy(sdk(), oneplus_7_pro, true);
    assert_eq!(adapter.backend(), BackendKind::GpuFp16);

    let unknown = table.classify(Some(&DeviceIdentity::new("Acme", "X1")));
    let adapter = InferenceAdapter::with_policy(sdk(), unknown, false);
    assert_eq!(adapter.backend(), BackendKind::GpuFp16);
}
