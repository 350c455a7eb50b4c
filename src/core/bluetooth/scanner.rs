use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bluest::error::ErrorKind;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use regex::Regex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::events::{EventSender, RadioEvent};
use crate::core::bluetooth::types::DeviceHandle;
use crate::error::ScanError;

/// Devices of the current scan, keyed by platform id
pub type DeviceMap = Arc<Mutex<HashMap<String, Device>>>;

pub struct BluetoothScanner {
    adapter: Adapter,
    devices: DeviceMap,
    events: EventSender,
    scan_duration: Duration,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<()>>,
}

impl BluetoothScanner {
    pub fn new(
        adapter: Adapter,
        devices: DeviceMap,
        events: EventSender,
        scan_duration: Duration,
    ) -> Self {
        Self {
            adapter,
            devices,
            events,
            scan_duration,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    /// Starts a scan task whose events carry `generation`, replacing any running one
    pub fn start_scan(&mut self, generation: u64) {
        self.stop_scan();
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        self.cancel_token = CancellationToken::new();
        let handle = tokio::spawn(Self::internal_scan_task(
            self.adapter.clone(),
            self.devices.clone(),
            self.events.clone(),
            self.cancel_token.clone(),
            self.scan_duration,
            generation,
        ));
        self.scan_task_handle = Some(handle);
        info!("Device scan task started.");
    }

    pub fn stop_scan(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.scan_task_handle.take() {
            if !handle.is_finished() {
                info!("Stopping Bluetooth scan.");
            }
        }
    }

    async fn internal_scan_task(
        adapter: Adapter,
        devices: DeviceMap,
        events: EventSender,
        cancel_token: CancellationToken,
        scan_duration: Duration,
        generation: u64,
    ) {
        let mut seen = HashSet::new();

        // devices already connected at OS level do not advertise
        match adapter.connected_devices().await {
            Ok(connected) => {
                for device in connected {
                    Self::emit_device_found(&devices, &events, &mut seen, device, None, generation);
                }
            }
            Err(e) => debug!("Could not list connected devices: {}", e),
        }

        info!("Starting bluetooth scan");
        let mut scan_stream = match adapter.scan(&[]).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to start bluetooth scan: {}", e);
                events.radio(generation, RadioEvent::ScanError(scan_error(&e)));
                return;
            }
        };

        let deadline = tokio::time::sleep(scan_duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            debug!("Found device - Device: {:?}, RSSI: {:?}", discovered_device.device, discovered_device.rssi);
                            Self::emit_device_found(
                                &devices,
                                &events,
                                &mut seen,
                                discovered_device.device,
                                discovered_device.adv_data.local_name,
                                generation,
                            );
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    info!("Scan window of {:?} elapsed.", scan_duration);
                    break;
                }
                _ = cancel_token.cancelled() => {
                    debug!("Scan {} cancelled.", generation);
                    return;
                }
            }
        }

        events.radio(generation, RadioEvent::ScanFinished);
    }

    /// Reports a device once per scan
    fn emit_device_found(
        devices: &DeviceMap,
        events: &EventSender,
        seen: &mut HashSet<String>,
        device: Device,
        local_name: Option<String>,
        generation: u64,
    ) {
        let id = device.id().to_string();
        if !seen.insert(id.clone()) {
            return;
        }

        let name = device.name().ok().or(local_name).unwrap_or_default();
        let address = extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string());
        info!("Found device: Address: {}, ID: {}, Name: {:?}", address, id, name);

        devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), device);

        // bluest only reports LE advertisers
        events.radio(
            generation,
            RadioEvent::DeviceObserved {
                handle: DeviceHandle(id),
                name,
                address,
                low_energy: true,
            },
        );
    }
}

fn extract_mac_address(device_id_str: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().to_uppercase())
}

fn scan_error(error: &bluest::Error) -> ScanError {
    classify_scan_error(error.kind(), error.to_string())
}

fn classify_scan_error(kind: ErrorKind, message: String) -> ScanError {
    match kind {
        ErrorKind::AdapterUnavailable => ScanError::PoweredOff,
        ErrorKind::Internal | ErrorKind::Other => ScanError::Unknown,
        _ => ScanError::InputOutput(message),
    }
}
