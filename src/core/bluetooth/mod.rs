//! Bluetooth functionality for the bridge
//! This module handles all bluetooth operations including scanning,
//! connecting, GATT discovery and characteristic I/O.

mod backend;
mod commands;
mod connection;
mod constants;
mod device;
mod events;
mod notification;
mod platform;
mod scanner;
mod selection;
mod session;
mod types;

// Re-export types that should be publicly accessible
pub use backend::{BleBackend, GattLink, RadioDiscovery};
pub use constants::*; // Re-export all constants
pub use device::{DeviceRecord, DeviceRegistry};
pub use events::{BleEvent, EventSender, LinkEvent, RadioEvent, SessionNotification};
pub use platform::BluestBackend;
pub use selection::{MatchRule, SelectionPolicy, select_index};
pub use session::GattSession;
pub use types::{
    CharacteristicBinding, CharacteristicHandle, CharacteristicInfo, CharacteristicProperties,
    ConnectionState, DescriptorHandle, DeviceHandle, ServiceHandle, ServiceRecord, ServiceState,
    WriteMode,
};
