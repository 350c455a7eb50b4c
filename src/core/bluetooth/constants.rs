//! Constants used throughout the bluetooth module
//! This module contains the GATT UUIDs, payload limits and timing defaults
//! shared by the session and the platform backend.

use uuid::Uuid;

/// Default display name of the peripheral to auto-connect to
pub const DEFAULT_TARGET_DEVICE_NAME: &str = "M5Stack";

/// Default service carrying the button state
pub const DEFAULT_TARGET_SERVICE_UUID: &str = "{5147b804-4b5b-429d-b6d2-0f4b8187a4ea}";

/// Default characteristic whose notifications carry the 8-bit button mask
pub const DEFAULT_TARGET_CHARACTERISTIC_UUID: &str = "{a851d6b3-6720-41e7-a9d4-81dcec2fd861}";

/// Client Characteristic Configuration descriptor
pub const UUID_CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid =
    Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// Little-endian 0x0001, the CCCD value that enables notifications
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Largest slice handed to a single characteristic write.
/// Fits the minimum ATT payload, so no MTU negotiation is needed.
pub const CHUNK_SIZE: usize = 20;

/// Default scan window in seconds before the scan reports it has finished
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 10;

/// Default interval for polling the link state of a connected device
pub const DEFAULT_LINK_POLL_INTERVAL_MS: u64 = 1000;
