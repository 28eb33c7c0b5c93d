use serde_json::Value;
use tracing::{debug, trace, warn};

use inspector_wire::{InboundMessage, MessageKind};

use crate::client::Shared;
use crate::dispatch::CommandResponse;
use crate::error::ClientError;
use crate::events::{EventKey, Notification};

impl Shared {
    /// Route one inbound envelope.
    ///
    /// Every decodable message is first published as a `message`
    /// notification. Then, in priority order: errors go to the `error`
    /// notification, responses resolve their pending command, events reach
    /// their `(domain, event)` listeners.
    pub(crate) fn route(&self, payload: &[u8]) {
        let raw: Value = match serde_json::from_slice(payload) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, len = payload.len(), "undecodable inbound message");
                self.notifications
                    .publish(&Notification::Error(ClientError::from(err)));
                return;
            }
        };

        self.notifications
            .publish(&Notification::Message(raw.clone()));

        let message = match InboundMessage::from_value(&raw) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "malformed inbound message");
                self.notifications
                    .publish(&Notification::Error(ClientError::from(err)));
                return;
            }
        };

        match message.classify() {
            MessageKind::Error { id, error } => {
                debug!(?id, %error, "endpoint reported error");
                self.notifications
                    .publish(&Notification::Error(ClientError::Protocol { id, error }));
            }
            MessageKind::Response { id: Some(id), result } => self.resolve(id, result),
            MessageKind::Response { id: None, .. } => {
                debug!("discarding response without id");
            }
            MessageKind::Event {
                domain,
                event,
                params,
            } => {
                let key = EventKey::new(domain, event);
                let delivered = self.events.publish(&key, &params);
                trace!(event = %key, delivered, "event routed");
            }
            MessageKind::Unrecognized => {
                debug!("ignoring unrecognized inbound message");
            }
        }
    }

    fn resolve(&self, id: u64, result: Value) {
        let pending = self.table.lock().take(id);
        match pending {
            Some(call) => {
                trace!(id, method = %call.method, "response matched");
                (call.continuation)(Ok(CommandResponse::new(id, result)));
            }
            None => debug!(id, "discarding response for unknown id"),
        }
    }
}
