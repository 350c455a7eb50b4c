//! Core functionality for the bridge
//! This module contains the BLE session and the decoding of the button state

pub mod bluetooth;
pub mod controller;

// Re-export commonly used types
pub use bluetooth::{BluestBackend, GattSession};
pub use controller::{InputDecoder, InputEdge, InputUpdate};
