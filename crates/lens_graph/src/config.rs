//! Model-level configuration consulted by the registry.

use serde::{Deserialize, Serialize};

use crate::tensor::Device;

/// Configuration for a [`HookedRoot`](crate::registry::HookedRoot).
///
/// # Example
///
/// ```ignore
/// let config: HookedConfig = serde_json::from_str(r#"{ "device": { "cuda": 0 } }"#)?;
/// let root = HookedRoot::with_config(model, config);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookedConfig {
    /// Device the model runs on; the default destination for cached values.
    pub device: Option<Device>,
}

impl HookedConfig {
    /// Creates a configuration with no device preference.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Picks the caching device: `explicit`, then the configured device,
    /// then the CPU.
    #[must_use]
    pub fn resolve_device(&self, explicit: Option<Device>) -> Device {
        explicit.or(self.device).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_resolution_order() {
        let unset = HookedConfig::new();
        assert_eq!(unset.resolve_device(None), Device::Cpu);

        let gpu = HookedConfig::new().with_device(Device::Cuda(1));
        assert_eq!(gpu.resolve_device(None), Device::Cuda(1));
        assert_eq!(gpu.resolve_device(Some(Device::Cpu)), Device::Cpu);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: HookedConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, HookedConfig::default());

        let config: HookedConfig = serde_json::from_str(r#"{ "device": { "cuda": 2 } }"#).unwrap();
        assert_eq!(config.device, Some(Device::Cuda(2)));

        let config: HookedConfig = serde_json::from_str(r#"{ "device": "cpu" }"#).unwrap();
        assert_eq!(config.device, Some(Device::Cpu));
    }
}
