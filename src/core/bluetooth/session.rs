//! GATT session for the bridge
//! This module owns the connection state machine: scanning, connecting,
//! service and characteristic discovery, notification enabling and writes.
//!
//! The session never blocks. Each public call issues requests on the backend and
//! returns; the backend reports progress through [`BleEvent`]s which are fed back
//! into [`GattSession::handle_event`]. Every event is tagged with the scan or link
//! generation it was issued for, and events from a torn down generation are dropped.

use log::{debug, info, trace, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::core::bluetooth::backend::BleBackend;
use crate::core::bluetooth::constants::{CHUNK_SIZE, ENABLE_NOTIFICATION_VALUE};
use crate::core::bluetooth::device::{DeviceRecord, DeviceRegistry};
use crate::core::bluetooth::events::{BleEvent, LinkEvent, RadioEvent, SessionNotification};
use crate::core::bluetooth::types::{
    CharacteristicBinding, ConnectionState, ServiceHandle, ServiceRecord, ServiceState, WriteMode,
};

/// Connection state machine over a [`BleBackend`]
pub struct GattSession<B: BleBackend> {
    backend: B,
    notifier: UnboundedSender<SessionNotification>,
    state: ConnectionState,
    devices: DeviceRegistry,
    services: Vec<ServiceRecord>,
    current_device: Option<usize>,
    current_service: Option<usize>,
    active_service: Option<ServiceHandle>,
    binding: Option<CharacteristicBinding>,
    scan_generation: u64,
    link_generation: u64,
    shutting_down: bool,
}

impl<B: BleBackend> GattSession<B> {
    /// Creates an idle session. Notifications for the shell are sent on `notifier`.
    pub fn new(backend: B, notifier: UnboundedSender<SessionNotification>) -> Self {
        Self {
            backend,
            notifier,
            state: ConnectionState::Idle,
            devices: DeviceRegistry::new(),
            services: Vec::new(),
            current_device: None,
            current_service: None,
            active_service: None,
            binding: None,
            scan_generation: 0,
            link_generation: 0,
            shutting_down: false,
        }
    }

    /// Drops any link and all discovered state, then restarts device discovery.
    pub fn scan(&mut self) {
        self.teardown_link();
        self.devices.clear();
        self.reset_services();
        self.transition(ConnectionState::Scanning);
        self.emit(SessionNotification::DevicesChanged);

        self.scan_generation += 1;
        info!("Starting device scan (generation {})", self.scan_generation);
        self.backend.stop_scan();
        self.backend.start_scan(self.scan_generation);
        self.status("Scanning for devices...", true);
    }

    /// Connects to the device at `index` of the current scan.
    /// An index that does not name a device is ignored.
    pub fn connect(&mut self, index: usize) {
        let Some(record) = self.devices.get(index).cloned() else {
            debug!("Ignoring connect request for unknown device index {}", index);
            return;
        };

        self.teardown_link();
        self.reset_services();
        self.transition(ConnectionState::Connecting);
        self.current_device = Some(index);

        info!(
            "Connecting to device - ID: {}, Name: {:?}, Address: {}",
            record.handle, record.name, record.address
        );
        self.backend.connect(&record.handle, self.link_generation);
        self.status("Connecting to device...", true);
    }

    /// Tears the link down, stops scanning and forgets the devices of the current scan.
    /// Unlike a link drop reported by the platform, this does not rescan.
    pub fn disconnect(&mut self) {
        info!("Disconnecting on request");
        self.backend.stop_scan();
        self.scan_generation += 1;
        self.teardown_link();
        self.devices.clear();
        self.reset_services();
        self.transition(ConnectionState::Idle);
        self.emit(SessionNotification::DevicesChanged);
    }

    /// Stops scanning and drops the link for good; later link drops will not rescan.
    pub fn shutdown(&mut self) {
        info!("Shutting down GATT session");
        self.shutting_down = true;
        self.backend.stop_scan();
        self.scan_generation += 1;
        self.teardown_link();
        self.transition(ConnectionState::Idle);
    }

    /// Selects the service at `index`. Selecting the active service again is a no-op.
    pub fn set_current_service(&mut self, index: usize) {
        self.select_service(index, false);
    }

    /// Writes `data` to the bound writable characteristic in [`CHUNK_SIZE`] slices.
    /// Slices are issued back to back without waiting for write confirmations.
    pub fn write(&mut self, data: &[u8]) {
        let Some((characteristic, mode)) = self
            .binding
            .as_ref()
            .and_then(|b| b.writable.map(|w| (w, b.write_mode)))
        else {
            trace!("Dropping write of {} bytes, no writable characteristic", data.len());
            return;
        };

        if data.len() > CHUNK_SIZE {
            for chunk in data.chunks(CHUNK_SIZE) {
                self.backend.write(&characteristic, chunk, mode);
            }
        } else {
            self.backend.write(&characteristic, data, mode);
        }
    }

    /// Requests a read of the bound readable characteristic
    pub fn read(&mut self) {
        if let Some(characteristic) = self.binding.as_ref().and_then(|b| b.readable) {
            self.backend.read(&characteristic);
        }
    }

    /// Consumes one platform event
    pub fn handle_event(&mut self, event: BleEvent) {
        match event {
            BleEvent::Radio { generation, event } => {
                if generation != self.scan_generation {
                    trace!("Dropping stale radio event from scan {}: {:?}", generation, event);
                    return;
                }
                self.on_radio_event(event);
            }
            BleEvent::Link { generation, event } => {
                if generation != self.link_generation {
                    debug!("Dropping stale link event from link {}: {:?}", generation, event);
                    return;
                }
                self.on_link_event(event);
            }
        }
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        self.devices.records()
    }

    pub fn services(&self) -> &[ServiceRecord] {
        &self.services
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    pub fn current_service(&self) -> Option<usize> {
        self.current_service
    }

    pub fn current_device(&self) -> Option<usize> {
        self.current_device
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn binding(&self) -> Option<&CharacteristicBinding> {
        self.binding.as_ref()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn on_radio_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::DeviceObserved {
                handle,
                name,
                address,
                low_energy,
            } => {
                if !low_energy {
                    trace!("Skipping non-LE device {}", handle);
                    return;
                }
                debug!("Observed LE device - ID: {}, Name: {:?}", handle, name);
                self.devices.push(DeviceRecord::new(handle, name, address));
                if self.state == ConnectionState::Scanning {
                    self.transition(ConnectionState::AwaitingDeviceSelection);
                }
                self.emit(SessionNotification::DevicesChanged);
                self.status("Low Energy device found. Scanning for more...", true);
            }
            RadioEvent::ScanFinished => {
                info!("Device scan finished with {} devices", self.devices.len());
                if self.devices.is_empty() {
                    self.status("No Low Energy devices found", false);
                }
            }
            RadioEvent::ScanError(error) => {
                warn!("Device scan failed: {:?}", error);
                self.status(&error.to_string(), false);
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                info!("Link established, discovering services...");
                self.reset_services();
                self.emit(SessionNotification::ServicesChanged);
                self.transition(ConnectionState::ServiceDiscovery);
                self.backend.discover_services();
            }
            LinkEvent::Disconnected => {
                info!("Link lost");
                self.link_lost();
            }
            LinkEvent::Error(error) => {
                warn!("Link error: {:?}", error);
                self.status(&error.to_string(), false);
                // the platform may keep the link up after a failed discovery
                if matches!(
                    self.state,
                    ConnectionState::Connecting | ConnectionState::ServiceDiscovery
                ) {
                    self.teardown_link();
                    self.link_lost();
                }
            }
            LinkEvent::ServiceDiscovered(uuid) => {
                debug!("Service discovered: {}", uuid);
                self.status("Service discovered. Waiting for service scan to be done...", true);
            }
            LinkEvent::ServiceScanFinished(uuids) => {
                if uuids.is_empty() {
                    self.status("Can't find any services.", true);
                    return;
                }
                self.services = uuids.into_iter().map(|uuid| ServiceRecord { uuid }).collect();
                info!("Service scan finished with {} services", self.services.len());
                self.emit(SessionNotification::ServicesChanged);
                self.select_service(0, true);
                self.status("All services discovered.", true);
            }
            LinkEvent::ServiceStateChanged { service, state } => {
                if self.active_service.map(|s| s.uuid) != Some(service) {
                    debug!("Ignoring state change of inactive service {}", service);
                    return;
                }
                debug!("Service {} is now {:?}", service, state);
                if state == ServiceState::Discovered {
                    self.search_characteristics();
                }
            }
            LinkEvent::ServiceError { service, error } => {
                warn!("Service {} error: {:?}", service, error);
                self.status(&error.to_string(), false);
            }
            LinkEvent::CharacteristicChanged {
                characteristic,
                value,
            }
            | LinkEvent::CharacteristicRead {
                characteristic,
                value,
            } => {
                trace!("Data from {}: {:?}", characteristic.uuid, value);
                self.emit(SessionNotification::DataReceived {
                    data: value,
                    characteristic: characteristic.uuid,
                });
            }
            LinkEvent::CharacteristicWritten {
                characteristic,
                value,
            } => {
                trace!("Characteristic {} written: {:?}", characteristic.uuid, value);
            }
        }
    }

    /// `force` runs the selection side effects even when `index` is already active.
    fn select_service(&mut self, index: usize, force: bool) {
        if !force && self.current_service == Some(index) {
            return;
        }

        let Some(record) = self.services.get(index).copied() else {
            self.status("Service not found.", false);
            return;
        };
        let Some(service) = self.backend.bind_service(record.uuid) else {
            self.status("Service not found.", false);
            return;
        };

        info!("Selecting service {} (index {})", record.label(), index);
        self.active_service = Some(service);
        self.binding = None;
        self.current_service = Some(index);
        self.transition(ConnectionState::DetailDiscovery);

        match self.backend.service_state(&service) {
            ServiceState::DiscoveryRequired => {
                self.status("Connecting to service...", true);
                self.backend.discover_details(&service);
            }
            ServiceState::DiscoveringDetails => {
                debug!("Details of {} are already being discovered", service.uuid);
            }
            ServiceState::Discovered => self.search_characteristics(),
        }

        self.emit(SessionNotification::CurrentServiceChanged(Some(index)));
    }

    /// Binds the characteristics of the active service and enables notifications.
    /// When several characteristics qualify, the last one in discovery order is kept.
    fn search_characteristics(&mut self) {
        let Some(service) = self.active_service else {
            return;
        };

        let mut binding = CharacteristicBinding::default();
        for info in self.backend.characteristics_of(&service) {
            if info.properties.is_writable() {
                binding.writable = Some(info.handle);
                binding.write_mode = if info.properties.write_without_response {
                    WriteMode::WithoutResponse
                } else {
                    WriteMode::WithResponse
                };
            }
            if info.properties.read {
                binding.readable = Some(info.handle);
            }
            if let Some(cccd) = info.cccd() {
                debug!("Enabling notifications on {}", info.handle.uuid);
                self.backend.write_descriptor(&cccd, &ENABLE_NOTIFICATION_VALUE);
                binding.notify_descriptor = Some(cccd);
            }
        }

        let writable = binding.writable.is_some();
        self.binding = Some(binding);
        if writable {
            self.transition(ConnectionState::Ready);
        } else {
            info!("Service {} has no writable characteristic", service.uuid);
        }
    }

    /// Forgets the link's services and, unless shutting down, scans again.
    fn link_lost(&mut self) {
        self.reset_services();
        self.emit(SessionNotification::ServicesChanged);
        self.current_device = None;
        self.transition(ConnectionState::Disconnected);
        self.status("Service disconnected", false);
        if !self.shutting_down {
            self.scan();
        }
    }

    /// Issues a disconnect if a link exists and invalidates the link generation.
    fn teardown_link(&mut self) {
        if self.state.has_link() {
            info!("Tearing down link to device {:?}", self.current_device);
            self.backend.disconnect();
        }
        self.link_generation += 1;
        self.current_device = None;
    }

    fn reset_services(&mut self) {
        self.services.clear();
        self.active_service = None;
        self.binding = None;
        if self.current_service.take().is_some() {
            self.emit(SessionNotification::CurrentServiceChanged(None));
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        debug!("Session state {:?} -> {:?}", self.state, next);
        let was_ready = self.state == ConnectionState::Ready;
        self.state = next;
        let is_ready = next == ConnectionState::Ready;
        if was_ready != is_ready {
            self.emit(SessionNotification::ConnectionChanged(is_ready));
        }
    }

    fn status(&self, text: &str, is_good: bool) {
        self.emit(SessionNotification::Status {
            text: text.to_string(),
            is_good,
        });
    }

    fn emit(&self, notification: SessionNotification) {
        if self.notifier.send(notification).is_err() {
            trace!("Session notification dropped, receiver is gone");
        }
    }
}
