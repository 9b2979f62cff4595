//! Error types for the relay hub

use broker_bridge::PublishError;
use thiserror::Error;

use crate::connection::ConnectionId;
use crate::state::StateKey;

/// Errors surfaced while relaying events between the broker and clients
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Outbound buffer of connection {0} is full")]
    CapacityExceeded(ConnectionId),

    #[error("Relay hub is no longer running")]
    HubClosed,
}

impl RelayError {
    /// Map a failed send to a connection into the relay taxonomy
    pub fn from_send(connection_id: ConnectionId, error: SendError) -> Self {
        match error {
            SendError::CapacityExceeded => RelayError::CapacityExceeded(connection_id),
            SendError::Closed => {
                RelayError::Transport(format!("connection {connection_id} is closed"))
            }
        }
    }
}

impl From<RegistryError> for RelayError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::DuplicateId(id) => RelayError::DuplicateConnection(id),
        }
    }
}

/// Reasons an inbound payload could not be turned into a state change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No state key is mapped to topic '{0}'")]
    UnknownTopic(String),

    #[error("Unknown state key '{0}'")]
    UnknownKey(String),

    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: StateKey, reason: String },

    #[error("Malformed JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(error: serde_json::Error) -> Self {
        DecodeError::Json(error.to_string())
    }
}

/// Errors from the connection registry
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Connection {0} is already registered")]
    DuplicateId(ConnectionId),
}

/// Why a payload could not be queued on a connection
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("Outbound buffer is full")]
    CapacityExceeded,

    #[error("Connection is closed")]
    Closed,
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
