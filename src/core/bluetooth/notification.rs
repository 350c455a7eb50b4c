//! Notification handling
//! This module subscribes to characteristic notifications and forwards every
//! value to the session as a characteristic-changed event.

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::events::{EventSender, LinkEvent};
use crate::core::bluetooth::types::CharacteristicHandle;

/// Notification handler for one link
#[derive(Clone)]
pub struct NotificationHandler {
    events: EventSender,
    generation: u64,
    cancel_token: CancellationToken,
}

impl NotificationHandler {
    pub fn new(events: EventSender, generation: u64, cancel_token: CancellationToken) -> Self {
        Self {
            events,
            generation,
            cancel_token,
        }
    }

    /// Subscribes to `characteristic`; values arrive until the link is torn down
    pub fn setup_notifications(&self, characteristic: Characteristic, handle: CharacteristicHandle) {
        info!("Subscribing to notifications of {}...", handle.uuid);
        let handler = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = handler.cancel_token.cancelled() => {
                    debug!("Notification stream of {} cancelled", handle.uuid);
                }
                _ = handler.process_notifications(characteristic, handle) => {}
            }
        });
    }

    async fn process_notifications(&self, characteristic: Characteristic, handle: CharacteristicHandle) {
        match characteristic.notify().await {
            Ok(mut notification_stream) => {
                while let Some(result) = notification_stream.next().await {
                    match result {
                        Ok(value) => {
                            debug!("Received notification from {}: {:?}", handle.uuid, value);
                            self.events.link(
                                self.generation,
                                LinkEvent::CharacteristicChanged {
                                    characteristic: handle,
                                    value,
                                },
                            );
                        }
                        Err(e) => {
                            error!("Error in notification stream of {}: {}", handle.uuid, e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to subscribe to notifications of {}: {}", handle.uuid, e);
            }
        }

        info!("Notification stream of {} ended", handle.uuid);
    }
}
