//! `bluest` implementation of the adapter traits

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow};
use bluest::Adapter;
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ScanConfig;
use crate::core::bluetooth::backend::{GattLink, RadioDiscovery};
use crate::core::bluetooth::commands::{CommandSender, GattCommand, command_channel};
use crate::core::bluetooth::connection::{
    ConnectionManager, LinkContext, SharedLink, lock_link, with_link,
};
use crate::core::bluetooth::events::{BleEvent, EventSender, LinkEvent};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::{BluetoothScanner, DeviceMap};
use crate::core::bluetooth::types::{
    CharacteristicHandle, CharacteristicInfo, DescriptorHandle, DeviceHandle, ServiceHandle,
    ServiceState, WriteMode,
};
use crate::error::LinkError;

/// Platform backend on top of the default system adapter
pub struct BluestBackend {
    events: EventSender,
    devices: DeviceMap,
    scanner: BluetoothScanner,
    connection_manager: ConnectionManager,
    link: SharedLink,
    link_cancel: CancellationToken,
    commands: Option<CommandSender>,
}

impl BluestBackend {
    /// Opens the default adapter and waits until it is available
    pub async fn new(events: UnboundedSender<BleEvent>, config: &ScanConfig) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let events = EventSender::new(events);
        let devices: DeviceMap = Arc::new(Mutex::new(HashMap::new()));
        let scanner = BluetoothScanner::new(
            adapter.clone(),
            devices.clone(),
            events.clone(),
            Duration::from_secs(config.timeout_secs),
        );
        let connection_manager = ConnectionManager::new(
            adapter,
            events.clone(),
            Duration::from_millis(config.link_poll_ms),
        );

        Ok(Self {
            events,
            devices,
            scanner,
            connection_manager,
            link: Arc::new(Mutex::new(None)),
            link_cancel: CancellationToken::new(),
            commands: None,
        })
    }

    /// Cancels the tasks of the current link and hands back its context
    fn drop_link(&mut self) -> Option<LinkContext> {
        self.link_cancel.cancel();
        self.commands = None;
        lock_link(&self.link).take()
    }

    fn generation(&self) -> Option<u64> {
        lock_link(&self.link).as_ref().map(|ctx| ctx.generation)
    }

    fn enqueue(&self, command: GattCommand) {
        match &self.commands {
            Some(commands) => commands.send(command),
            None => debug!("No link, dropping {:?}", command),
        }
    }

    fn spawn_for_link<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.link_cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = task => {}
            }
        });
    }
}

impl RadioDiscovery for BluestBackend {
    fn start_scan(&mut self, generation: u64) {
        self.scanner.start_scan(generation);
    }

    fn stop_scan(&mut self) {
        self.scanner.stop_scan();
    }
}

impl GattLink for BluestBackend {
    fn connect(&mut self, device: &DeviceHandle, generation: u64) {
        if let Some(previous) = self.drop_link() {
            let manager = self.connection_manager.clone();
            tokio::spawn(manager.disconnect(previous.device, previous.generation));
        }

        let found = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&device.0)
            .cloned();
        let Some(target) = found else {
            warn!("Device {} is not part of the current scan", device);
            self.events.link(
                generation,
                LinkEvent::Error(LinkError::DeviceUnavailable(device.to_string())),
            );
            self.events.link(generation, LinkEvent::Disconnected);
            return;
        };

        self.link_cancel = CancellationToken::new();
        *lock_link(&self.link) = Some(LinkContext::new(generation, target.clone()));

        let notifications =
            NotificationHandler::new(self.events.clone(), generation, self.link_cancel.clone());
        let (commands, executor) =
            command_channel(self.link.clone(), self.events.clone(), generation, notifications);
        self.commands = Some(commands);

        self.spawn_for_link(executor.run());
        self.spawn_for_link(self.connection_manager.clone().connect(target, generation));
    }

    fn disconnect(&mut self) {
        match self.drop_link() {
            Some(ctx) => {
                let manager = self.connection_manager.clone();
                tokio::spawn(manager.disconnect(ctx.device, ctx.generation));
            }
            None => debug!("Disconnect requested without a link"),
        }
    }

    fn discover_services(&mut self) {
        let Some(generation) = self.generation() else {
            return;
        };
        let manager = self.connection_manager.clone();
        self.spawn_for_link(manager.discover_services(self.link.clone(), generation));
    }

    fn bind_service(&mut self, uuid: Uuid) -> Option<ServiceHandle> {
        lock_link(&self.link)
            .as_ref()
            .and_then(|ctx| ctx.service(uuid))
            .map(|_| ServiceHandle { uuid })
    }

    fn service_state(&self, service: &ServiceHandle) -> ServiceState {
        lock_link(&self.link)
            .as_ref()
            .map(|ctx| ctx.service_state(service.uuid))
            .unwrap_or(ServiceState::DiscoveryRequired)
    }

    fn discover_details(&mut self, service: &ServiceHandle) {
        let Some(generation) = self.generation() else {
            return;
        };
        let target = with_link(&self.link, generation, |ctx| {
            let found = ctx.service(service.uuid).cloned();
            if found.is_some() {
                ctx.discovering.insert(service.uuid);
            }
            found
        })
        .flatten();
        let Some(target) = target else {
            debug!("Service {} is not bound on link {}", service.uuid, generation);
            return;
        };

        let manager = self.connection_manager.clone();
        self.spawn_for_link(manager.discover_details(self.link.clone(), generation, target));
    }

    fn characteristics_of(&self, service: &ServiceHandle) -> Vec<CharacteristicInfo> {
        lock_link(&self.link)
            .as_ref()
            .and_then(|ctx| ctx.details.get(&service.uuid))
            .map(|chars| {
                chars
                    .iter()
                    .enumerate()
                    .map(|(index, c)| c.info(service.uuid, index))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn read(&mut self, characteristic: &CharacteristicHandle) {
        self.enqueue(GattCommand::Read {
            characteristic: *characteristic,
        });
    }

    fn write(&mut self, characteristic: &CharacteristicHandle, data: &[u8], mode: WriteMode) {
        self.enqueue(GattCommand::Write {
            characteristic: *characteristic,
            data: data.to_vec(),
            mode,
        });
    }

    fn write_descriptor(&mut self, descriptor: &DescriptorHandle, data: &[u8]) {
        self.enqueue(GattCommand::WriteDescriptor {
            descriptor: *descriptor,
            data: data.to_vec(),
        });
    }
}
