//! Device identity registry: hardware IMEI to logical device name.

use std::collections::HashMap;

/// Immutable map from device IMEI to logical name.
///
/// Built once from configuration before the receive loop starts; only
/// datagrams from registered devices are relayed. No writer exists after
/// construction, so the registry is shared by plain reference without
/// synchronization.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, String>, // imei -> logical name
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry {
            devices: HashMap::new(),
        }
    }

    /// Build from configured (logical name, imei) pairs.
    pub fn from_devices<'a, I>(devices: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut registry = DeviceRegistry::new();
        for (name, imei) in devices {
            registry.add(name, imei);
        }
        registry
    }

    /// Register one device. Later entries win on duplicate IMEIs.
    pub fn add(&mut self, name: &str, imei: &str) {
        self.devices.insert(imei.to_string(), name.to_string());
    }

    /// Logical name for an IMEI, if registered.
    pub fn lookup(&self, imei: &str) -> Option<&str> {
        self.devices.get(imei).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
