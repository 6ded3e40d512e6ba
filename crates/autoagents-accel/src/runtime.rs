//! Runtime (hardware backend) selection.

use crate::device::DevicePolicy;
use crate::sdk::AcceleratorSdk;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Hardware or numeric-precision execution path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Dedicated AI accelerator, 8-bit fixed point.
    FixedPointAccelerator,
    /// DSP, 8-bit fixed point.
    FixedPointDsp,
    /// DSP, SDK-chosen precision.
    Dsp,
    /// Mobile GPU, float16.
    GpuFp16,
    /// Mobile GPU, float32 storage with float16 math.
    GpuHybrid,
    /// CPU, float32.
    CpuFp32,
    /// CPU, SDK-chosen precision.
    Cpu,
}

impl BackendKind {
    /// Candidates in priority order.
    pub const PREFERENCE: [BackendKind; 5] = [
        BackendKind::FixedPointAccelerator,
        BackendKind::FixedPointDsp,
        BackendKind::GpuFp16,
        BackendKind::GpuHybrid,
        BackendKind::CpuFp32,
    ];

    /// The leading fixed-point entries of [`BackendKind::PREFERENCE`].
    const FIXED_POINT_CANDIDATES: usize = 2;

    /// Stable, human-readable backend name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::FixedPointAccelerator => "AIP_FIXED8_TF",
            BackendKind::FixedPointDsp => "DSP_FIXED8_TF",
            BackendKind::Dsp => "DSP",
            BackendKind::GpuFp16 => "GPU_FLOAT16",
            BackendKind::GpuHybrid => "GPU_FLOAT32_16_HYBRID",
            BackendKind::CpuFp32 => "CPU_FLOAT32",
            BackendKind::Cpu => "CPU",
        }
    }

    /// Whether this is one of the fixed-point accelerator/DSP paths.
    pub fn is_fixed_point(&self) -> bool {
        matches!(
            self,
            BackendKind::FixedPointAccelerator | BackendKind::FixedPointDsp
        )
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick a backend for a device policy and caller preference.
///
/// Devices that must avoid the accelerator, and callers that do not prefer
/// it, skip the fixed-point candidates. Accelerator-only devices consider
/// only those candidates and fall back to [`BackendKind::Dsp`]. Everything
/// else falls back to [`BackendKind::Cpu`] when no candidate is available.
pub fn select_backend(
    policy: DevicePolicy,
    prefer_accelerator: bool,
    mut is_available: impl FnMut(BackendKind) -> bool,
) -> BackendKind {
    let ignore_accelerator = policy.must_avoid_accelerator || !prefer_accelerator;
    let restrict_to_accelerator = policy.accelerator_only && prefer_accelerator;

    let start = if ignore_accelerator {
        BackendKind::FIXED_POINT_CANDIDATES
    } else {
        0
    };
    let end = if restrict_to_accelerator {
        BackendKind::FIXED_POINT_CANDIDATES
    } else {
        BackendKind::PREFERENCE.len()
    };
    let fallback = if restrict_to_accelerator {
        BackendKind::Dsp
    } else {
        BackendKind::Cpu
    };

    BackendKind::PREFERENCE[start..end]
        .iter()
        .copied()
        .find(|candidate| is_available(*candidate))
        .unwrap_or(fallback)
}

/// Version of the SDK library, queried once per process.
pub fn sdk_version<S: AcceleratorSdk + ?Sized>(sdk: &S) -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let version = sdk.library_version();
        log::info!("Accelerator SDK version {version}");
        version
    })
}

/// Selects a backend using an SDK's availability queries.
pub struct RuntimeSelector<'a, S: ?Sized> {
    sdk: &'a S,
    policy: DevicePolicy,
}

impl<'a, S: AcceleratorSdk + ?Sized> RuntimeSelector<'a, S> {
    pub fn new(sdk: &'a S, policy: DevicePolicy) -> Self {
        Self { sdk, policy }
    }

    /// Selector for the running host using the built-in device tables.
    pub fn for_host(sdk: &'a S) -> Self {
        Self::new(sdk, crate::device::classify())
    }

    pub fn policy(&self) -> DevicePolicy {
        self.policy
    }

    pub fn select(&self, prefer_accelerator: bool) -> BackendKind {
        sdk_version(self.sdk);
        let backend = select_backend(self.policy, prefer_accelerator, |candidate| {
            log::debug!("Testing runtime {candidate}");
            self.sdk.is_runtime_available(candidate)
        });
        log::info!("Using runtime {backend}");
        backend
    }

    /// Human-readable name of the backend [`RuntimeSelector::select`] would pick.
    pub fn describe(&self, prefer_accelerator: bool) -> String {
        self.select(prefer_accelerator).to_string()
    }
}

/// Whether the SDK can run at all on this host (the float32 CPU path is usable).
pub fn is_backend_family_available<S: AcceleratorSdk + ?Sized>(sdk: &S) -> bool {
    sdk.is_runtime_available(BackendKind::CpuFp32)
}

/// Name of the backend the running host would use.
pub fn preferred_backend_name<S: AcceleratorSdk + ?Sized>(
    sdk: &S,
    prefer_accelerator: bool,
) -> String {
    RuntimeSelector::for_host(sdk).describe(prefer_accelerator)
}
