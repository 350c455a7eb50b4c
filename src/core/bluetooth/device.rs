//! Discovered peripherals of the current scan

use crate::core::bluetooth::types::DeviceHandle;

/// Represents a discovered Bluetooth device
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeviceRecord {
    /// The advertised name of the device, empty if none
    pub name: String,
    /// The address of the device (MAC address on most platforms, "N/A" when the platform hides it)
    pub address: String,
    /// Platform-specific unique identifier for the device
    pub handle: DeviceHandle,
}

impl DeviceRecord {
    /// Creates a new DeviceRecord instance
    pub fn new(handle: DeviceHandle, name: String, address: String) -> Self {
        Self {
            name,
            address,
            handle,
        }
    }
}

/// Append-only list of the devices observed since the last scan started.
/// Indices handed out are only meaningful until the next [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DeviceRecord) -> usize {
        self.devices.push(record);
        self.devices.len() - 1
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn get(&self, index: usize) -> Option<&DeviceRecord> {
        self.devices.get(index)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.devices
    }
}
