//! Events flowing into and out of the GATT session.
//!
//! `BleEvent`s are produced by the platform backend and consumed by
//! [`GattSession::handle_event`](super::GattSession::handle_event).
//! `SessionNotification`s are produced by the session for the consuming shell.

use log::error;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::core::bluetooth::types::{CharacteristicHandle, DeviceHandle, ServiceState};
use crate::error::{LinkError, ScanError, ServiceError};

/// Inbound event from the platform layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    /// Discovery agent event, tagged with the scan generation it belongs to
    Radio { generation: u64, event: RadioEvent },
    /// Link event, tagged with the link generation it belongs to
    Link { generation: u64, event: LinkEvent },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    DeviceObserved {
        handle: DeviceHandle,
        name: String,
        address: String,
        low_energy: bool,
    },
    ScanFinished,
    ScanError(ScanError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Error(LinkError),
    ServiceDiscovered(Uuid),
    /// Service discovery is done; carries the UUIDs in discovery order
    ServiceScanFinished(Vec<Uuid>),
    ServiceStateChanged { service: Uuid, state: ServiceState },
    ServiceError { service: Uuid, error: ServiceError },
    CharacteristicChanged { characteristic: CharacteristicHandle, value: Vec<u8> },
    CharacteristicRead { characteristic: CharacteristicHandle, value: Vec<u8> },
    CharacteristicWritten { characteristic: CharacteristicHandle, value: Vec<u8> },
}

/// Notification for the consuming shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotification {
    DevicesChanged,
    ServicesChanged,
    CurrentServiceChanged(Option<usize>),
    ConnectionChanged(bool),
    Status { text: String, is_good: bool },
    DataReceived { data: Vec<u8>, characteristic: Uuid },
}

/// Sending half of the platform event channel, tagging events with their generation
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: UnboundedSender<BleEvent>,
}

impl EventSender {
    pub fn new(tx: UnboundedSender<BleEvent>) -> Self {
        Self { tx }
    }

    pub fn radio(&self, generation: u64, event: RadioEvent) {
        self.send(BleEvent::Radio { generation, event });
    }

    pub fn link(&self, generation: u64, event: LinkEvent) {
        self.send(BleEvent::Link { generation, event });
    }

    fn send(&self, event: BleEvent) {
        if let Err(e) = self.tx.send(event) {
            error!("Failed to deliver BLE event, session is gone: {:?}", e.0);
        }
    }
}
