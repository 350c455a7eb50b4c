#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

use ble_osc_bridge::core::bluetooth::{
    BleEvent, CharacteristicHandle, CharacteristicInfo, CharacteristicProperties,
    DescriptorHandle, DeviceHandle, GattLink, GattSession, LinkEvent, RadioDiscovery, RadioEvent,
    ServiceHandle, ServiceState, SessionNotification, UUID_CLIENT_CHARACTERISTIC_CONFIGURATION,
    WriteMode,
};
use ble_osc_bridge::mapping::EventSink;

pub const SERVICE_A: Uuid = Uuid::from_u128(0x5147b804_4b5b_429d_b6d2_0f4b8187a4ea);
pub const SERVICE_B: Uuid = Uuid::from_u128(0x1ed42829_cd7a_44e6_87db_24fed6422bc4);
pub const BUTTONS: Uuid = Uuid::from_u128(0xa851d6b3_6720_41e7_a9d4_81dcec2fd861);
pub const COMMAND: Uuid = Uuid::from_u128(0x503423d1_ad1f_4ed3_b3df_06e276798fba);
pub const STATUS: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Every adapter call the session made, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartScan(u64),
    StopScan,
    Connect(DeviceHandle, u64),
    Disconnect,
    DiscoverServices,
    BindService(Uuid),
    DiscoverDetails(Uuid),
    Read(Uuid),
    Write {
        characteristic: Uuid,
        data: Vec<u8>,
        mode: WriteMode,
    },
    WriteDescriptor {
        characteristic: Uuid,
        data: Vec<u8>,
    },
}

/// Records calls and answers queries from canned service tables
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub calls: Vec<Call>,
    services: HashMap<Uuid, (ServiceState, Vec<CharacteristicInfo>)>,
}

impl FakeBackend {
    pub fn with_service(
        mut self,
        uuid: Uuid,
        state: ServiceState,
        characteristics: Vec<CharacteristicInfo>,
    ) -> Self {
        self.services.insert(uuid, (state, characteristics));
        self
    }

    pub fn set_state(&mut self, uuid: Uuid, state: ServiceState) {
        if let Some(entry) = self.services.get_mut(&uuid) {
            entry.0 = state;
        }
    }

    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| f(c)).count()
    }

    pub fn scans(&self) -> usize {
        self.count(|c| matches!(c, Call::StartScan(_)))
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>, WriteMode)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Write {
                    characteristic,
                    data,
                    mode,
                } => Some((*characteristic, data.clone(), *mode)),
                _ => None,
            })
            .collect()
    }

    pub fn descriptor_writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::WriteDescriptor {
                    characteristic,
                    data,
                } => Some((*characteristic, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn last_scan_generation(&self) -> u64 {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::StartScan(g) => Some(*g),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub fn last_link_generation(&self) -> u64 {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Connect(_, g) => Some(*g),
                _ => None,
            })
            .unwrap_or(0)
    }
}

impl RadioDiscovery for FakeBackend {
    fn start_scan(&mut self, generation: u64) {
        self.calls.push(Call::StartScan(generation));
    }

    fn stop_scan(&mut self) {
        self.calls.push(Call::StopScan);
    }
}

impl GattLink for FakeBackend {
    fn connect(&mut self, device: &DeviceHandle, generation: u64) {
        self.calls.push(Call::Connect(device.clone(), generation));
    }

    fn disconnect(&mut self) {
        self.calls.push(Call::Disconnect);
    }

    fn discover_services(&mut self) {
        self.calls.push(Call::DiscoverServices);
    }

    fn bind_service(&mut self, uuid: Uuid) -> Option<ServiceHandle> {
        self.calls.push(Call::BindService(uuid));
        self.services.contains_key(&uuid).then_some(ServiceHandle { uuid })
    }

    fn service_state(&self, service: &ServiceHandle) -> ServiceState {
        self.services
            .get(&service.uuid)
            .map(|(state, _)| *state)
            .unwrap_or(ServiceState::DiscoveryRequired)
    }

    fn discover_details(&mut self, service: &ServiceHandle) {
        self.calls.push(Call::DiscoverDetails(service.uuid));
    }

    fn characteristics_of(&self, service: &ServiceHandle) -> Vec<CharacteristicInfo> {
        self.services
            .get(&service.uuid)
            .map(|(_, chars)| chars.clone())
            .unwrap_or_default()
    }

    fn read(&mut self, characteristic: &CharacteristicHandle) {
        self.calls.push(Call::Read(characteristic.uuid));
    }

    fn write(&mut self, characteristic: &CharacteristicHandle, data: &[u8], mode: WriteMode) {
        self.calls.push(Call::Write {
            characteristic: characteristic.uuid,
            data: data.to_vec(),
            mode,
        });
    }

    fn write_descriptor(&mut self, descriptor: &DescriptorHandle, data: &[u8]) {
        self.calls.push(Call::WriteDescriptor {
            characteristic: descriptor.characteristic.uuid,
            data: data.to_vec(),
        });
    }
}

/// Records every value handed to the sink; clones share the record
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<(String, i32)>>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(String, i32)> {
        self.sent.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn send_int(&mut self, address: &str, value: i32) -> Result<()> {
        self.sent.lock().unwrap().push((address.to_string(), value));
        Ok(())
    }
}

pub fn props(read: bool, write: bool, write_without_response: bool) -> CharacteristicProperties {
    CharacteristicProperties {
        read,
        write,
        write_without_response,
        notify: false,
        indicate: false,
    }
}

pub fn characteristic(
    service: Uuid,
    uuid: Uuid,
    index: usize,
    properties: CharacteristicProperties,
    notifies: bool,
) -> CharacteristicInfo {
    let handle = CharacteristicHandle {
        service,
        uuid,
        index,
    };
    let descriptors = if notifies {
        vec![DescriptorHandle {
            characteristic: handle,
            uuid: UUID_CLIENT_CHARACTERISTIC_CONFIGURATION,
        }]
    } else {
        Vec::new()
    };
    CharacteristicInfo {
        handle,
        properties: CharacteristicProperties {
            notify: notifies,
            ..properties
        },
        descriptors,
    }
}

/// The button service of the target peripheral: notify + write-without-response
pub fn button_service() -> Vec<CharacteristicInfo> {
    vec![characteristic(SERVICE_A, BUTTONS, 0, props(true, false, true), true)]
}

pub fn observed(generation: u64, id: &str, name: &str, low_energy: bool) -> BleEvent {
    BleEvent::Radio {
        generation,
        event: RadioEvent::DeviceObserved {
            handle: DeviceHandle(id.to_string()),
            name: name.to_string(),
            address: "N/A".to_string(),
            low_energy,
        },
    }
}

pub fn link(generation: u64, event: LinkEvent) -> BleEvent {
    BleEvent::Link { generation, event }
}

pub fn notified(generation: u64, service: Uuid, uuid: Uuid, value: &[u8]) -> BleEvent {
    link(
        generation,
        LinkEvent::CharacteristicChanged {
            characteristic: CharacteristicHandle {
                service,
                uuid,
                index: 0,
            },
            value: value.to_vec(),
        },
    )
}

pub fn session(
    backend: FakeBackend,
) -> (GattSession<FakeBackend>, UnboundedReceiver<SessionNotification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (GattSession::new(backend, tx), rx)
}

pub fn drain(rx: &mut UnboundedReceiver<SessionNotification>) -> Vec<SessionNotification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

/// Drives a session from scan to a bound service; returns the link generation
pub fn connect_and_discover(session: &mut GattSession<FakeBackend>, services: Vec<Uuid>) -> u64 {
    session.scan();
    let scan = session.backend().last_scan_generation();
    session.handle_event(observed(scan, "dev-1", "M5Stack", true));
    session.connect(0);
    let generation = session.backend().last_link_generation();
    session.handle_event(link(generation, LinkEvent::Connected));
    session.handle_event(link(generation, LinkEvent::ServiceScanFinished(services)));
    generation
}

/// Finishes detail discovery of `service` the way the platform reports it
pub fn finish_details(session: &mut GattSession<FakeBackend>, generation: u64, service: Uuid) {
    session.backend_mut().set_state(service, ServiceState::Discovered);
    session.handle_event(link(
        generation,
        LinkEvent::ServiceStateChanged {
            service,
            state: ServiceState::Discovered,
        },
    ));
}
