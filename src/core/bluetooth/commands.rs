//! GATT operation queue
//! Reads and writes of one link are executed strictly in the order they were
//! issued by a single task, so the chunks of a payload are never interleaved.

use bluest::{Characteristic, Descriptor};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::core::bluetooth::connection::{SharedLink, with_link};
use crate::core::bluetooth::constants::{
    ENABLE_NOTIFICATION_VALUE, UUID_CLIENT_CHARACTERISTIC_CONFIGURATION,
};
use crate::core::bluetooth::events::{EventSender, LinkEvent};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::types::{CharacteristicHandle, DescriptorHandle, WriteMode};
use crate::error::ServiceError;

/// A queued GATT operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattCommand {
    Read {
        characteristic: CharacteristicHandle,
    },
    Write {
        characteristic: CharacteristicHandle,
        data: Vec<u8>,
        mode: WriteMode,
    },
    WriteDescriptor {
        descriptor: DescriptorHandle,
        data: Vec<u8>,
    },
}

/// Clonable handle that queues commands for the link's executor
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<GattCommand>,
}

impl CommandSender {
    pub fn send(&self, command: GattCommand) {
        if let Err(e) = self.tx.send(command) {
            warn!("GATT command dropped, link executor is gone: {:?}", e.0);
        }
    }
}

/// Executes the commands of one link
pub struct CommandExecutor {
    rx: mpsc::UnboundedReceiver<GattCommand>,
    link: SharedLink,
    events: EventSender,
    generation: u64,
    notifications: NotificationHandler,
}

/// Creates the queue of a link together with the executor draining it
pub fn command_channel(
    link: SharedLink,
    events: EventSender,
    generation: u64,
    notifications: NotificationHandler,
) -> (CommandSender, CommandExecutor) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        CommandSender { tx },
        CommandExecutor {
            rx,
            link,
            events,
            generation,
            notifications,
        },
    )
}

impl CommandExecutor {
    pub async fn run(mut self) {
        info!("GATT command executor for link {} started", self.generation);
        while let Some(command) = self.rx.recv().await {
            self.execute(command).await;
        }
        debug!("GATT command executor for link {} stopped", self.generation);
    }

    async fn execute(&self, command: GattCommand) {
        match command {
            GattCommand::Read { characteristic } => {
                let Some(target) = self.characteristic(&characteristic) else {
                    self.not_found(characteristic.service);
                    return;
                };
                match target.read().await {
                    Ok(value) => self.events.link(
                        self.generation,
                        LinkEvent::CharacteristicRead {
                            characteristic,
                            value,
                        },
                    ),
                    Err(e) => self.service_error(
                        characteristic.service,
                        ServiceError::ReadFailed(e.to_string()),
                    ),
                }
            }
            GattCommand::Write {
                characteristic,
                data,
                mode,
            } => {
                let Some(target) = self.characteristic(&characteristic) else {
                    self.not_found(characteristic.service);
                    return;
                };
                let result = match mode {
                    WriteMode::WithoutResponse => target.write_without_response(&data).await,
                    WriteMode::WithResponse => target.write(&data).await,
                };
                match result {
                    Ok(()) => self.events.link(
                        self.generation,
                        LinkEvent::CharacteristicWritten {
                            characteristic,
                            value: data,
                        },
                    ),
                    Err(e) => self.service_error(
                        characteristic.service,
                        ServiceError::WriteFailed(e.to_string()),
                    ),
                }
            }
            GattCommand::WriteDescriptor { descriptor, data } => {
                self.write_descriptor(descriptor, data).await;
            }
        }
    }

    /// The platform stacks own the CCCD, so enabling notifications there means
    /// subscribing instead of writing the descriptor.
    async fn write_descriptor(&self, descriptor: DescriptorHandle, data: Vec<u8>) {
        let service = descriptor.characteristic.service;
        if descriptor.uuid == UUID_CLIENT_CHARACTERISTIC_CONFIGURATION
            && data == ENABLE_NOTIFICATION_VALUE
        {
            let Some(characteristic) = self.characteristic(&descriptor.characteristic) else {
                self.not_found(service);
                return;
            };
            self.notifications
                .setup_notifications(characteristic, descriptor.characteristic);
            return;
        }

        let Some(target) = self.descriptor(&descriptor) else {
            self.not_found(service);
            return;
        };
        if let Err(e) = target.write(&data).await {
            self.service_error(service, ServiceError::DescriptorWriteFailed(e.to_string()));
        }
    }

    fn characteristic(&self, handle: &CharacteristicHandle) -> Option<Characteristic> {
        with_link(&self.link, self.generation, |ctx| {
            ctx.characteristic(handle).map(|c| c.characteristic.clone())
        })
        .flatten()
    }

    fn descriptor(&self, handle: &DescriptorHandle) -> Option<Descriptor> {
        with_link(&self.link, self.generation, |ctx| ctx.descriptor(handle).cloned()).flatten()
    }

    fn not_found(&self, service: uuid::Uuid) {
        self.service_error(service, ServiceError::NotFound);
    }

    fn service_error(&self, service: uuid::Uuid, error: ServiceError) {
        warn!("GATT command on service {} failed: {}", service, error);
        self.events
            .link(self.generation, LinkEvent::ServiceError { service, error });
    }
}
