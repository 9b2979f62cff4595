//! Cloneable handle for feeding the relay hub

use broker_bridge::{DeliveryError, InboundMessage, InboundSink};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::connection::ConnectionId;
use crate::error::{RelayError, Result};
use crate::event::{HubCommand, HubMessage, RelayEvent};
use crate::state::{RelayReader, RelayRecord};

/// Producer side of the hub queue
///
/// Held by the broker bridge, every client connection task and the HTTP
/// layer. The hub stops once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubMessage>,
    state: RelayReader,
}

impl HubHandle {
    /// Create the hub queue
    ///
    /// Returns the handle and the receiver to pass to
    /// [`RelayHub::run`](crate::RelayHub::run).
    pub fn channel(capacity: usize, state: RelayReader) -> (Self, mpsc::Receiver<HubMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, state }, rx)
    }

    /// Queue an event, waiting for space if the queue is full
    pub async fn submit(&self, event: RelayEvent) -> Result<()> {
        self.tx
            .send(HubMessage::Event(event))
            .await
            .map_err(|_| RelayError::HubClosed)
    }

    /// Apply a JSON state change through the hub
    pub async fn apply_state(&self, key: impl Into<String>, value: Value) -> Result<RelayRecord> {
        let (reply, rx) = oneshot::channel();
        self.command(HubCommand::ApplyState {
            key: key.into(),
            value,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::HubClosed)?
    }

    /// Ids of all registered connections, in registration order
    pub async fn connections(&self) -> Result<Vec<ConnectionId>> {
        let (reply, rx) = oneshot::channel();
        self.command(HubCommand::Connections { reply }).await?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }

    /// Read-only view of the state store
    pub fn state(&self) -> &RelayReader {
        &self.state
    }

    /// Whether the hub has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn command(&self, command: HubCommand) -> Result<()> {
        self.tx
            .send(HubMessage::Command(command))
            .await
            .map_err(|_| RelayError::HubClosed)
    }
}

impl InboundSink for HubHandle {
    fn deliver(&self, message: InboundMessage) -> std::result::Result<(), DeliveryError> {
        let event = RelayEvent::BrokerInbound {
            topic: message.topic,
            payload: message.payload,
        };
        self.tx.try_send(event.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
