//! # Broker Bridge
//!
//! Maintains a resilient connection to an external MQTT broker and turns
//! inbound publishes into relay input.
//!
//! ## Overview
//!
//! - **Fixed Subscription Set**: reissued after every (re)connect
//! - **Non-blocking Hand-off**: inbound messages go to an [`InboundSink`]
//!   that never stalls the network loop
//! - **Unbounded Retries**: exponential backoff, never terminates the process
//! - **Reported Publishes**: [`BrokerPublisher::publish`] returns a
//!   [`PublishError`] instead of dropping silently
//!
//! ## Usage
//!
//! ```rust,ignore
//! use broker_bridge::{BrokerBridge, BrokerConfig, BrokerPublisher};
//!
//! let config = BrokerConfig::new("broker.local", 1883)
//!     .with_credentials("relay", "secret")
//!     .with_subscriptions(["led/color", "led/power", "nav/+"]);
//!
//! let bridge = BrokerBridge::spawn(config, hub_handle)?;
//! bridge.publisher().publish("relay/outbound", "hello".into())?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! BrokerBridge
//!     │
//!     ├── Worker task ── rumqttc EventLoop ── InboundSink::deliver
//!     │
//!     └── BrokerHandle ── AsyncClient::try_publish
//! ```

pub mod backoff;
pub mod bridge;
pub mod config;
pub mod error;
pub mod sink;
pub mod topic;
mod worker;

pub use backoff::{Backoff, ReconnectConfig};
pub use bridge::{BridgeState, BrokerBridge, BrokerHandle, BrokerPublisher};
pub use config::{BrokerConfig, Credentials, TlsConfig};
pub use error::{BridgeError, DeliveryError, PublishError, Result};
pub use sink::{InboundMessage, InboundSink};

// Re-export commonly used types from dependencies
pub use rumqttc::QoS;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BridgeError, BridgeState, BrokerBridge, BrokerConfig, BrokerHandle, BrokerPublisher,
        InboundMessage, InboundSink, PublishError,
    };
}
