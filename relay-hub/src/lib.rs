//! Relay Hub
//!
//! The serialized core of the relay. Broker messages, client frames and
//! HTTP commands all arrive on one bounded queue and are handled one at a
//! time by [`RelayHub`], which owns the state store and the connection
//! registry.
//!
//! # Architecture
//!
//! ```text
//! BrokerBridge ──deliver()──┐
//! ws connection tasks ──────┼──► HubHandle ──► mpsc ──► RelayHub::run
//! HTTP handlers ────────────┘                             │
//!                                                         ├── RelayStore::set
//!                                                         ├── ConnectionRegistry::broadcast
//!                                                         └── BrokerPublisher::publish
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use broker_bridge::{BrokerBridge, BrokerConfig};
//! use relay_hub::{initial_store, HubConfig, HubHandle, RelayHub, TopicTable};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HubConfig::default();
//! let topics = TopicTable::default();
//! let store = initial_store();
//!
//! let (handle, inbox) = HubHandle::channel(config.queue_capacity, store.reader());
//! let bridge = BrokerBridge::spawn(
//!     BrokerConfig::default().with_subscriptions(topics.filters()),
//!     handle.clone(),
//! )?;
//!
//! RelayHub::new(store, topics, Arc::new(bridge.publisher()), &config).spawn(inbox);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod event;
pub mod handle;
pub mod hub;
pub mod registry;
pub mod state;
pub mod topics;

pub use connection::{Connection, ConnectionId, ConnectionIdGenerator, Payload};
pub use error::{DecodeError, RegistryError, RelayError, Result, SendError};
pub use event::{HubCommand, HubMessage, RelayEvent};
pub use handle::HubHandle;
pub use hub::{EventOutcome, HubConfig, RelayHub};
pub use registry::{ConnectionRegistry, DeliveryReport};
pub use state::{
    initial_store, Direction, NavState, Power, RelayReader, RelayRecord, RelayStore, StateKey,
    StateValue,
};
pub use topics::{TopicRoute, TopicTable};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::connection::{Connection, ConnectionId, Payload};
    pub use crate::error::{RelayError, Result};
    pub use crate::event::RelayEvent;
    pub use crate::handle::HubHandle;
    pub use crate::hub::{HubConfig, RelayHub};
    pub use crate::state::{StateKey, StateValue};
}
