use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while setting up or tearing down the broker bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// TLS material could not be loaded
    #[error("Failed to read TLS file {path}: {source}")]
    Tls {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error occurred during shutdown
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Errors reported to callers of [`BrokerPublisher::publish`](crate::BrokerPublisher::publish)
///
/// A publish failure never affects the bridge's own reconnect loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The bridge is not currently connected and subscribed
    #[error("Broker not connected (state: {0})")]
    NotConnected(crate::BridgeState),

    /// The MQTT client rejected the request (queue full or closed)
    #[error("Broker client rejected publish: {0}")]
    Client(String),
}

/// Errors returned by an [`InboundSink`](crate::InboundSink) when handing off a message
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving queue is full; the message was dropped
    #[error("Inbound queue is full")]
    Full,

    /// The receiving side has gone away
    #[error("Inbound queue is closed")]
    Closed,
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
