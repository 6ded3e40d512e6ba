//! Device capability detection.
//!
//! Classifies the host device into an accelerator usage policy using its
//! manufacturer/model identity and two static tables: devices that must run
//! on the fixed-point accelerator paths only, and devices whose accelerator
//! path is known to be broken. The tables are data, so deployments can
//! replace them through [`crate::AdapterConfig`].

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// System property holding the device manufacturer.
pub const MANUFACTURER_PROPERTY: &str = "ro.product.manufacturer";
/// System property holding the device model.
pub const MODEL_PROPERTY: &str = "ro.product.model";

/// Read-only access to host system properties.
pub trait PropertySource {
    /// Whether the host exposes system properties at all.
    fn has_system_properties(&self) -> bool;

    /// Look up a property; `None` when the key is not defined.
    fn property(&self, key: &str) -> Option<String>;
}

/// Host system properties.
///
/// On Android these come from the property service. Other hosts have no
/// such properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProperties;

impl PropertySource for SystemProperties {
    fn has_system_properties(&self) -> bool {
        cfg!(target_os = "android")
    }

    #[cfg(target_os = "android")]
    fn property(&self, key: &str) -> Option<String> {
        use std::ffi::{CStr, CString};

        let key = CString::new(key).ok()?;
        let mut value = vec![0 as libc::c_char; libc::PROP_VALUE_MAX as usize + 1];
        // A zero length means the property is not defined.
        // SAFETY: key is a valid C string and value holds PROP_VALUE_MAX + 1
        // bytes, the most the property service writes.
        let len = unsafe { libc::__system_property_get(key.as_ptr(), value.as_mut_ptr()) };
        if len <= 0 {
            return None;
        }
        // SAFETY: value was zero-filled and the property fits in PROP_VALUE_MAX
        // bytes, so the buffer stays NUL-terminated.
        let value = unsafe { CStr::from_ptr(value.as_ptr()) };
        Some(value.to_string_lossy().into_owned())
    }

    #[cfg(not(target_os = "android"))]
    fn property(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Manufacturer/model pair reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub manufacturer: String,
    pub model: String,
}

impl DeviceIdentity {
    pub fn new(manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
        }
    }

    /// Read the identity from a property source.
    ///
    /// Returns `None` when the source has no system properties. Missing
    /// individual properties read as empty strings.
    pub fn from_properties(source: &dyn PropertySource) -> Option<Self> {
        if !source.has_system_properties() {
            return None;
        }
        Some(Self {
            manufacturer: source.property(MANUFACTURER_PROPERTY).unwrap_or_default(),
            model: source.property(MODEL_PROPERTY).unwrap_or_default(),
        })
    }

    /// Identity of the running host, captured once per process.
    pub fn host() -> Option<&'static DeviceIdentity> {
        static HOST: OnceLock<Option<DeviceIdentity>> = OnceLock::new();
        HOST.get_or_init(|| {
            let identity = DeviceIdentity::from_properties(&SystemProperties);
            match &identity {
                Some(id) => log::debug!(
                    "Device identity: manufacturer={:?} model={:?}",
                    id.manufacturer,
                    id.model
                ),
                None => log::debug!("Host exposes no system properties"),
            }
            identity
        })
        .as_ref()
    }
}

/// Matches a manufacturer, optionally narrowed to one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRule {
    pub manufacturer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DeviceRule {
    /// Rule matching every model of a manufacturer.
    pub fn manufacturer(manufacturer: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: None,
        }
    }

    /// Rule matching a single manufacturer/model pair.
    pub fn model(manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: Some(model.into()),
        }
    }

    pub fn matches(&self, identity: &DeviceIdentity) -> bool {
        self.manufacturer == identity.manufacturer
            && self
                .model
                .as_deref()
                .is_none_or(|model| model == identity.model)
    }
}

/// Accelerator usage policy for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DevicePolicy {
    /// The accelerator/DSP path is broken on this device.
    pub must_avoid_accelerator: bool,
    /// The device only runs models on the accelerator/DSP path.
    pub accelerator_only: bool,
}

impl DevicePolicy {
    /// Policy applied when the host has no system properties.
    pub const HOST_DEFAULT: DevicePolicy = DevicePolicy {
        must_avoid_accelerator: false,
        accelerator_only: true,
    };
}

/// Allow/deny tables driving device classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePolicyTable {
    #[serde(default)]
    pub accelerator_only: Vec<DeviceRule>,
    #[serde(default)]
    pub must_avoid_accelerator: Vec<DeviceRule>,
}

impl Default for DevicePolicyTable {
    fn default() -> Self {
        Self {
            accelerator_only: vec![
                DeviceRule::manufacturer("Microsoft"),
                // Epsilon selfhost
                DeviceRule::manufacturer("oema0"),
                // Zeta EV2
                DeviceRule::model("oemc1", "sf c1"),
                // Zeta EV1.2
                DeviceRule::model("QUALCOMM", "oemc1"),
                // OnePlus 7
                DeviceRule::model("OnePlus", "GM1903"),
                // OnePlus 7T
                DeviceRule::model("OnePlus", "HD1903"),
            ],
            must_avoid_accelerator: vec![
                // OnePlus 7 Pro
                DeviceRule::model("OnePlus", "GM1925"),
            ],
        }
    }
}

impl DevicePolicyTable {
    /// Table with no entries; every identified device gets the neutral policy.
    pub fn empty() -> Self {
        Self {
            accelerator_only: Vec::new(),
            must_avoid_accelerator: Vec::new(),
        }
    }

    /// Classify a device.
    ///
    /// `None` means the host has no system properties. Such hosts are
    /// treated as accelerator-only, which makes them prefer the DSP path
    /// whenever the caller asks for acceleration.
    pub fn classify(&self, identity: Option<&DeviceIdentity>) -> DevicePolicy {
        let Some(identity) = identity else {
            return DevicePolicy::HOST_DEFAULT;
        };
        DevicePolicy {
            must_avoid_accelerator: self
                .must_avoid_accelerator
                .iter()
                .any(|rule| rule.matches(identity)),
            accelerator_only: self
                .accelerator_only
                .iter()
                .any(|rule| rule.matches(identity)),
        }
    }

    /// Classify the running host.
    pub fn classify_host(&self) -> DevicePolicy {
        self.classify(DeviceIdentity::host())
    }
}

/// Classify the running host with the built-in tables.
pub fn classify() -> DevicePolicy {
    DevicePolicyTable::default().classify_host()
}
