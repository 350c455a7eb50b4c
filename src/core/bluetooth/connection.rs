//! Bluetooth connection handling
//! This module connects to a peripheral, watches the link and runs service and
//! characteristic discovery on it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bluest::{Adapter, Characteristic, Descriptor, Device, Service};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::events::{EventSender, LinkEvent};
use crate::core::bluetooth::types::{
    CharacteristicHandle, CharacteristicInfo, CharacteristicProperties, DescriptorHandle,
    ServiceState,
};
use crate::error::{LinkError, ServiceError};

/// A characteristic with everything detail discovery learned about it
#[derive(Clone)]
pub struct DiscoveredCharacteristic {
    pub characteristic: Characteristic,
    pub properties: CharacteristicProperties,
    pub descriptors: Vec<Descriptor>,
}

impl DiscoveredCharacteristic {
    pub fn info(&self, service: Uuid, index: usize) -> CharacteristicInfo {
        let handle = CharacteristicHandle {
            service,
            uuid: self.characteristic.uuid(),
            index,
        };
        CharacteristicInfo {
            handle,
            properties: self.properties,
            descriptors: self
                .descriptors
                .iter()
                .map(|d| DescriptorHandle {
                    characteristic: handle,
                    uuid: d.uuid(),
                })
                .collect(),
        }
    }
}

/// Platform objects of the active link
pub struct LinkContext {
    pub generation: u64,
    pub device: Device,
    pub services: Vec<Service>,
    pub details: HashMap<Uuid, Vec<DiscoveredCharacteristic>>,
    pub discovering: HashSet<Uuid>,
}

impl LinkContext {
    pub fn new(generation: u64, device: Device) -> Self {
        Self {
            generation,
            device,
            services: Vec::new(),
            details: HashMap::new(),
            discovering: HashSet::new(),
        }
    }

    pub fn service(&self, uuid: Uuid) -> Option<&Service> {
        self.services.iter().find(|s| s.uuid() == uuid)
    }

    pub fn service_state(&self, uuid: Uuid) -> ServiceState {
        if self.details.contains_key(&uuid) {
            ServiceState::Discovered
        } else if self.discovering.contains(&uuid) {
            ServiceState::DiscoveringDetails
        } else {
            ServiceState::DiscoveryRequired
        }
    }

    pub fn characteristic(&self, handle: &CharacteristicHandle) -> Option<&DiscoveredCharacteristic> {
        self.details
            .get(&handle.service)
            .and_then(|chars| chars.get(handle.index))
            .filter(|c| c.characteristic.uuid() == handle.uuid)
    }

    pub fn descriptor(&self, handle: &DescriptorHandle) -> Option<&Descriptor> {
        self.characteristic(&handle.characteristic)
            .and_then(|c| c.descriptors.iter().find(|d| d.uuid() == handle.uuid))
    }
}

/// The link shared between the backend and its tasks; `None` while no link exists
pub type SharedLink = Arc<Mutex<Option<LinkContext>>>;

pub fn lock_link(link: &SharedLink) -> MutexGuard<'_, Option<LinkContext>> {
    link.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f` on the link context if it still belongs to `generation`
pub fn with_link<T>(
    link: &SharedLink,
    generation: u64,
    f: impl FnOnce(&mut LinkContext) -> T,
) -> Option<T> {
    let mut guard = lock_link(link);
    guard
        .as_mut()
        .filter(|ctx| ctx.generation == generation)
        .map(f)
}

/// Connection manager for the peripheral
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Adapter,
    events: EventSender,
    poll_interval: Duration,
}

impl ConnectionManager {
    pub fn new(adapter: Adapter, events: EventSender, poll_interval: Duration) -> Self {
        Self {
            adapter,
            events,
            poll_interval,
        }
    }

    /// Connects to `device` and then watches the link until it drops.
    /// A failed attempt is reported as an error followed by a disconnect.
    pub async fn connect(self, device: Device, generation: u64) {
        let id = device.id().to_string();
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Device details - ID: {}, Name: {:?}", id, name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", id);
            if let Err(e) = self.adapter.connect_device(&device).await {
                warn!("Connection to {} failed: {}", id, e);
                self.events.link(
                    generation,
                    LinkEvent::Error(LinkError::ConnectionFailed(e.to_string())),
                );
                self.events.link(generation, LinkEvent::Disconnected);
                return;
            }
        }

        info!("Connection to {} successful", id);
        self.events.link(generation, LinkEvent::Connected);
        self.watch_link(device, generation).await;
    }

    async fn watch_link(&self, device: Device, generation: u64) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            if !device.is_connected().await {
                info!("Device {} lost connection", device.id());
                self.events.link(generation, LinkEvent::Disconnected);
                return;
            }
        }
    }

    /// Discovers the primary services of the link's device
    pub async fn discover_services(self, link: SharedLink, generation: u64) {
        let Some(device) = with_link(&link, generation, |ctx| ctx.device.clone()) else {
            return;
        };

        let services = match device.discover_services().await {
            Ok(services) => services,
            Err(e) => {
                warn!("Service discovery failed: {}", e);
                self.events.link(
                    generation,
                    LinkEvent::Error(LinkError::DiscoveryFailed(e.to_string())),
                );
                return;
            }
        };

        let uuids: Vec<Uuid> = services.iter().map(Service::uuid).collect();
        for uuid in &uuids {
            info!("Available service: {}", uuid);
            self.events.link(generation, LinkEvent::ServiceDiscovered(*uuid));
        }

        if with_link(&link, generation, |ctx| ctx.services = services).is_none() {
            debug!("Link {} went away during service discovery", generation);
            return;
        }
        self.events
            .link(generation, LinkEvent::ServiceScanFinished(uuids));
    }

    /// Discovers characteristics, their properties and descriptors for `service`
    pub async fn discover_details(self, link: SharedLink, generation: u64, service: Service) {
        let uuid = service.uuid();
        self.events.link(
            generation,
            LinkEvent::ServiceStateChanged {
                service: uuid,
                state: ServiceState::DiscoveringDetails,
            },
        );

        match Self::collect_characteristics(&service).await {
            Ok(characteristics) => {
                info!("Service {} has {} characteristics", uuid, characteristics.len());
                let stored = with_link(&link, generation, |ctx| {
                    ctx.discovering.remove(&uuid);
                    ctx.details.insert(uuid, characteristics);
                });
                if stored.is_some() {
                    self.events.link(
                        generation,
                        LinkEvent::ServiceStateChanged {
                            service: uuid,
                            state: ServiceState::Discovered,
                        },
                    );
                }
            }
            Err(e) => {
                warn!("Detail discovery of {} failed: {}", uuid, e);
                with_link(&link, generation, |ctx| ctx.discovering.remove(&uuid));
                self.events.link(
                    generation,
                    LinkEvent::ServiceError {
                        service: uuid,
                        error: ServiceError::DiscoveryFailed(e.to_string()),
                    },
                );
            }
        }
    }

    async fn collect_characteristics(
        service: &Service,
    ) -> Result<Vec<DiscoveredCharacteristic>, bluest::Error> {
        let mut discovered = Vec::new();
        for characteristic in service.discover_characteristics().await? {
            let properties = characteristic.properties().await?;
            let descriptors = match characteristic.discover_descriptors().await {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    debug!("No descriptors for {}: {}", characteristic.uuid(), e);
                    Vec::new()
                }
            };
            let properties = CharacteristicProperties {
                read: properties.read,
                write: properties.write,
                write_without_response: properties.write_without_response,
                notify: properties.notify,
                indicate: properties.indicate,
            };
            debug!("Characteristic {} properties {:?}", characteristic.uuid(), properties);
            discovered.push(DiscoveredCharacteristic {
                characteristic,
                properties,
                descriptors,
            });
        }
        Ok(discovered)
    }

    /// Disconnects from the device and reports the drop for `generation`
    pub async fn disconnect(self, device: Device, generation: u64) {
        if device.is_connected().await {
            info!("Disconnecting from device {}", device.id());
            if let Err(e) = self.adapter.disconnect_device(&device).await {
                warn!("Disconnect from {} failed: {}", device.id(), e);
            } else {
                info!("Successfully disconnected");
            }
        } else {
            info!("Device {} not connected", device.id());
        }
        self.events.link(generation, LinkEvent::Disconnected);
    }
}
