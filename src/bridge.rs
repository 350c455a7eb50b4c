//! Headless bridge
//! Picks the target device and service as soon as they show up, decodes the
//! button mask from the target characteristic and publishes bit edges to an
//! [`EventSink`].

use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

use crate::config::TargetConfig;
use crate::core::bluetooth::{BleBackend, BleEvent, GattSession, SelectionPolicy, SessionNotification};
use crate::core::controller::InputDecoder;
use crate::error::ConfigError;
use crate::mapping::{EventSink, InputMapper};

/// How long to keep consuming platform events after shutdown so the disconnect can go out
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Progress of the automatic selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionFlags {
    pub device_available: bool,
    pub service_available: bool,
    pub connection_ready: bool,
}

impl ConnectionFlags {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct Bridge<B: BleBackend, S: EventSink> {
    session: GattSession<B>,
    notifications: UnboundedReceiver<SessionNotification>,
    policy: SelectionPolicy,
    target_characteristic: Uuid,
    flags: ConnectionFlags,
    decoder: InputDecoder,
    mapper: InputMapper,
    sink: Option<S>,
    status: String,
}

impl<B: BleBackend, S: EventSink> Bridge<B, S> {
    pub fn new(
        backend: B,
        sink: S,
        target: &TargetConfig,
        mapper: InputMapper,
    ) -> Result<Self, ConfigError> {
        let (tx, notifications) = mpsc::unbounded_channel();
        Ok(Self {
            session: GattSession::new(backend, tx),
            notifications,
            policy: target.selection_policy(),
            target_characteristic: target.characteristic()?,
            flags: ConnectionFlags::default(),
            decoder: InputDecoder::new(),
            mapper,
            sink: Some(sink),
            status: String::new(),
        })
    }

    /// Starts the first scan
    pub fn start(&mut self) {
        info!(
            "Looking for {:?} with service {}",
            self.policy.device_name, self.policy.service_uuid
        );
        self.rescan();
    }

    /// Forgets the current selection and scans again
    pub fn rescan(&mut self) {
        self.flags.clear();
        self.session.scan();
        self.drain_notifications();
    }

    pub fn handle_ble_event(&mut self, event: BleEvent) {
        self.session.handle_event(event);
        self.drain_notifications();
    }

    /// Stops the session and closes the sink
    pub fn shutdown(&mut self) {
        self.session.shutdown();
        self.drain_notifications();
        self.flags.clear();
        if self.sink.take().is_some() {
            info!("Event sink closed");
        }
    }

    /// Runs until Ctrl-C or until the platform event channel closes.
    pub async fn run(&mut self, mut events: UnboundedReceiver<BleEvent>) -> Result<()> {
        self.start();

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_ble_event(event),
                    None => {
                        warn!("BLE event channel closed");
                        break;
                    }
                },
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    info!("Ctrl-C received, shutting down");
                    break;
                }
            }
        }

        self.shutdown();
        while let Ok(Some(event)) = tokio::time::timeout(SHUTDOWN_GRACE, events.recv()).await {
            self.handle_ble_event(event);
        }
        Ok(())
    }

    pub fn session(&self) -> &GattSession<B> {
        &self.session
    }

    pub fn flags(&self) -> ConnectionFlags {
        self.flags
    }

    /// Last status line shown to the user
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Current button mask
    pub fn buttons(&self) -> u8 {
        self.decoder.previous()
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    fn drain_notifications(&mut self) {
        while let Ok(notification) = self.notifications.try_recv() {
            self.on_notification(notification);
        }
    }

    fn on_notification(&mut self, notification: SessionNotification) {
        match notification {
            SessionNotification::DevicesChanged => self.devices_changed(),
            SessionNotification::ServicesChanged => self.services_changed(),
            SessionNotification::CurrentServiceChanged(index) => {
                debug!("Current service is now {:?}", index);
            }
            SessionNotification::ConnectionChanged(connected) => {
                self.flags.connection_ready = connected;
                if connected {
                    self.show_status("", true);
                } else {
                    self.show_status("Connection lost", false);
                }
            }
            SessionNotification::Status { text, is_good } => self.show_status(&text, is_good),
            SessionNotification::DataReceived {
                data,
                characteristic,
            } => self.data_received(&data, characteristic),
        }
    }

    fn devices_changed(&mut self) {
        let devices = self.session.devices();
        if devices.is_empty() {
            self.flags.clear();
            return;
        }
        if self.flags.device_available {
            return;
        }

        if let Some(index) = self.policy.pick_device(devices) {
            info!("Target device found at index {}", index);
            self.flags.device_available = true;
            self.session.connect(index);
        }
    }

    fn services_changed(&mut self) {
        if self.flags.service_available {
            return;
        }

        if let Some(index) = self.policy.pick_service(self.session.services()) {
            info!("Target service found at index {}", index);
            self.flags.service_available = true;
            self.session.set_current_service(index);
        }
    }

    fn data_received(&mut self, data: &[u8], characteristic: Uuid) {
        if characteristic != self.target_characteristic {
            debug!("Ignoring {} bytes from {}", data.len(), characteristic);
            return;
        }
        let Some(update) = self.decoder.parse_data(data) else {
            return;
        };

        let levels: String = update
            .levels()
            .iter()
            .rev()
            .map(|&on| if on { '1' } else { '0' })
            .collect();
        debug!("Buttons {}", levels);

        if let Some(sink) = self.sink.as_mut() {
            self.mapper.update(&update, sink);
        }
    }

    fn show_status(&mut self, text: &str, is_good: bool) {
        let text = if self.flags.connection_ready { "Ready" } else { text };
        if text.is_empty() || text == self.status {
            return;
        }
        if is_good || self.flags.connection_ready {
            info!("{}", text);
        } else {
            warn!("{}", text);
        }
        self.status = text.to_string();
    }
}
