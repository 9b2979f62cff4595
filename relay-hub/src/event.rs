//! Messages consumed by the relay hub

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::connection::{Connection, ConnectionId, Payload};
use crate::error::RelayError;
use crate::state::RelayRecord;

/// Something that happened on either side of the relay
#[derive(Debug)]
pub enum RelayEvent {
    /// A message arrived from the broker
    BrokerInbound { topic: String, payload: Bytes },
    /// A frame arrived from a client
    ClientInbound {
        connection_id: ConnectionId,
        payload: Payload,
    },
    /// A client finished its handshake
    ConnectionOpened { connection: Connection },
    /// A client went away
    ConnectionClosed { connection_id: ConnectionId },
}

/// Request with a reply, sent by the HTTP layer
#[derive(Debug)]
pub enum HubCommand {
    /// Decode and apply a state change, replying with the new record
    ApplyState {
        key: String,
        value: Value,
        reply: oneshot::Sender<Result<RelayRecord, RelayError>>,
    },
    /// Reply with the ids of all registered connections
    Connections {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
}

/// Everything that travels on the hub queue
#[derive(Debug)]
pub enum HubMessage {
    Event(RelayEvent),
    Command(HubCommand),
}

impl From<RelayEvent> for HubMessage {
    fn from(event: RelayEvent) -> Self {
        HubMessage::Event(event)
    }
}

impl From<HubCommand> for HubMessage {
    fn from(command: HubCommand) -> Self {
        HubMessage::Command(command)
    }
}
