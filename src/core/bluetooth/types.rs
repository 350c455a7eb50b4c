//! Defines shared data structures for the Bluetooth module.
//! Handles are small value types so the session never holds platform objects;
//! the backend resolves them against whatever it keeps for the current link.

use std::fmt;

use uuid::Uuid;

/// Platform specific identifier of a discovered peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct DeviceHandle(pub String);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A service bound on the active link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    pub uuid: Uuid,
}

/// A characteristic of a bound service.
/// `index` is the position in the service's characteristic list, which keeps two
/// characteristics sharing a UUID apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    pub service: Uuid,
    pub uuid: Uuid,
    pub index: usize,
}

/// A descriptor of a characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle {
    pub characteristic: CharacteristicHandle,
    pub uuid: Uuid,
}

/// GATT characteristic properties the session cares about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProperties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl CharacteristicProperties {
    pub fn is_writable(&self) -> bool {
        self.write || self.write_without_response
    }
}

/// A characteristic as reported by detail discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub handle: CharacteristicHandle,
    pub properties: CharacteristicProperties,
    pub descriptors: Vec<DescriptorHandle>,
}

impl CharacteristicInfo {
    /// Returns the Client Characteristic Configuration descriptor, if exposed
    pub fn cccd(&self) -> Option<DescriptorHandle> {
        self.descriptors
            .iter()
            .find(|d| d.uuid == super::constants::UUID_CLIENT_CHARACTERISTIC_CONFIGURATION)
            .copied()
    }
}

/// How characteristic writes are issued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    WithResponse,
    WithoutResponse,
}

/// Detail discovery state of a bound service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    DiscoveryRequired,
    DiscoveringDetails,
    Discovered,
}

/// A service found by service discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRecord {
    pub uuid: Uuid,
}

impl ServiceRecord {
    /// Canonical braced, lower-case form used as the service's label
    pub fn label(&self) -> String {
        self.uuid.braced().to_string()
    }
}

/// Characteristics picked from the selected service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacteristicBinding {
    pub readable: Option<CharacteristicHandle>,
    pub writable: Option<CharacteristicHandle>,
    pub write_mode: WriteMode,
    pub notify_descriptor: Option<DescriptorHandle>,
}

/// Lifecycle of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Scanning,
    AwaitingDeviceSelection,
    Connecting,
    ServiceDiscovery,
    DetailDiscovery,
    Ready,
    Disconnected,
}

impl ConnectionState {
    /// Whether a link to a peripheral exists in this state
    pub fn has_link(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::ServiceDiscovery | Self::DetailDiscovery | Self::Ready
        )
    }
}
