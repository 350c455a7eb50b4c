//! Error types for the bridge.
//! Everything that can go wrong on the radio side is reported as a status line and never
//! stops the process, so these types mostly exist for their `Display` text.

use thiserror::Error;

/// Failures of the device discovery agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("The Bluetooth adapter is powered off, power it on before doing discovery.")]
    PoweredOff,
    #[error("Writing or reading from the device resulted in an error: {0}")]
    InputOutput(String),
    #[error("An unknown error has occurred during discovery.")]
    Unknown,
}

/// Controller level failures of a link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("Device {0} is no longer known to the adapter.")]
    DeviceUnavailable(String),
    #[error("Cannot connect to remote device: {0}")]
    ConnectionFailed(String),
    #[error("Service discovery failed: {0}")]
    DiscoveryFailed(String),
}

/// GATT level failures of a selected service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Service details could not be discovered: {0}")]
    DiscoveryFailed(String),
    #[error("Characteristic read failed: {0}")]
    ReadFailed(String),
    #[error("Characteristic write failed: {0}")]
    WriteFailed(String),
    #[error("Descriptor write failed: {0}")]
    DescriptorWriteFailed(String),
    #[error("Service or characteristic not found.")]
    NotFound,
}

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid UUID {value:?} for {field}")]
    InvalidUuid { field: &'static str, value: String },
    #[error("OSC binding for {address:?} uses bit {bit}, expected 0..=7")]
    InvalidBit { address: String, bit: u8 },
    #[error("invalid socket address {value:?} for {field}")]
    InvalidAddress { field: &'static str, value: String },
}
