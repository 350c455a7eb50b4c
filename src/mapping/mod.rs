pub mod osc;

use anyhow::Result;
use log::{debug, warn};

use crate::config::OscBinding;
use crate::core::controller::InputUpdate;

pub use osc::OscTransmitter;

/// Destination for decoded input events
pub trait EventSink {
    fn send_int(&mut self, address: &str, value: i32) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn send_int(&mut self, address: &str, value: i32) -> Result<()> {
        (**self).send_int(address, value)
    }
}

/// Turns bit edges into sink calls according to the configured bindings
#[derive(Debug, Clone, Default)]
pub struct InputMapper {
    bindings: Vec<OscBinding>,
}

impl InputMapper {
    pub fn new(bindings: Vec<OscBinding>) -> Self {
        Self { bindings }
    }

    /// Publishes one value per binding whose bit changed in `update`.
    /// Returns how many messages were handed to the sink.
    pub fn update<S: EventSink + ?Sized>(&self, update: &InputUpdate, sink: &mut S) -> usize {
        let mut sent = 0;
        for binding in &self.bindings {
            let Some(edge) = update.edge(binding.bit) else {
                continue;
            };
            let value = i32::from(edge.value);
            debug!("bit {} -> {} = {}", binding.bit, binding.address, value);
            match sink.send_int(&binding.address, value) {
                Ok(()) => sent += 1,
                Err(e) => warn!("Failed to publish {}: {}", binding.address, e),
            }
        }
        sent
    }
}
