//! Hand-off of inbound broker messages
//!
//! The bridge never waits on its consumer: `deliver` must return
//! immediately, dropping the message if the consumer is saturated.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::DeliveryError;

/// One message received from the broker, uninterpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,
    /// Raw payload bytes
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Consumer of inbound broker messages
pub trait InboundSink: Send + Sync + 'static {
    /// Hand a message to the consumer without blocking
    fn deliver(&self, message: InboundMessage) -> Result<(), DeliveryError>;
}

impl InboundSink for mpsc::Sender<InboundMessage> {
    fn deliver(&self, message: InboundMessage) -> Result<(), DeliveryError> {
        self.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
