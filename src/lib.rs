//! BLE to OSC bridge library
//! Connects to a BLE peripheral exposing a button characteristic and republishes
//! button edges as OSC messages over UDP.

// Module declarations
pub mod bridge;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod utils;

pub use bridge::{Bridge, ConnectionFlags};
pub use config::AppConfig;
