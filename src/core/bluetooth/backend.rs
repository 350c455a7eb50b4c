//! Adapter traits between the GATT session and the platform BLE stack.
//!
//! Every request method returns immediately; completion is reported later as a
//! [`BleEvent`](super::BleEvent) on the channel the backend was built with.
//! The only synchronous calls are the queries over state the backend already holds.

use uuid::Uuid;

use crate::core::bluetooth::types::{
    CharacteristicHandle, CharacteristicInfo, DescriptorHandle, DeviceHandle, ServiceHandle,
    ServiceState, WriteMode,
};

/// Device discovery agent
pub trait RadioDiscovery {
    /// Starts a fresh scan. Events of this scan carry `generation`.
    fn start_scan(&mut self, generation: u64);

    fn stop_scan(&mut self);
}

/// Connection to a single peripheral and its GATT database
pub trait GattLink {
    /// Opens a link to `device`, dropping any previous one.
    /// Events of this link carry `generation`.
    fn connect(&mut self, device: &DeviceHandle, generation: u64);

    fn disconnect(&mut self);

    fn discover_services(&mut self);

    /// Resolves a discovered service on the current link
    fn bind_service(&mut self, uuid: Uuid) -> Option<ServiceHandle>;

    fn service_state(&self, service: &ServiceHandle) -> ServiceState;

    fn discover_details(&mut self, service: &ServiceHandle);

    /// Characteristics of a service whose details are discovered
    fn characteristics_of(&self, service: &ServiceHandle) -> Vec<CharacteristicInfo>;

    fn read(&mut self, characteristic: &CharacteristicHandle);

    fn write(&mut self, characteristic: &CharacteristicHandle, data: &[u8], mode: WriteMode);

    fn write_descriptor(&mut self, descriptor: &DescriptorHandle, data: &[u8]);
}

/// A complete platform layer
pub trait BleBackend: RadioDiscovery + GattLink {}

impl<T: RadioDiscovery + GattLink> BleBackend for T {}
