//! HTTP API and WebSocket transport for the broker relay.
//!
//! This crate is the outer surface of the relay: a warp server that accepts
//! WebSocket clients at `/ws` and exposes the shared state over a small JSON
//! API. It holds no state of its own; everything goes through a
//! [`HubHandle`](relay_hub::HubHandle).
//!
//! # Overview
//!
//! - [`RelayServer`]: binds, serves and shuts down gracefully.
//! - [`routes`]: the warp filter tree, usable directly with `warp::test`.
//! - [`ServerConfig`]: bind address, per-client buffer size and CORS origins.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use broker_bridge::{BrokerPublisher, PublishError};
//! use relay_hub::{initial_store, HubConfig, HubHandle, RelayHub, TopicTable};
//! use relay_server::{RelayServer, ServerConfig};
//!
//! struct Offline;
//!
//! impl BrokerPublisher for Offline {
//!     fn publish(&self, _topic: &str, _payload: bytes::Bytes) -> Result<(), PublishError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relay_server::ServerError> {
//!     let store = initial_store();
//!     let (handle, inbox) = HubHandle::channel(1024, store.reader());
//!     RelayHub::new(store, TopicTable::default(), Arc::new(Offline), &HubConfig::default())
//!         .spawn(inbox);
//!
//!     let server = RelayServer::start(ServerConfig::default(), handle).await?;
//!     println!("Relay listening at {}", server.base_url());
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     server.shutdown().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
mod ws;

pub use config::{ServerConfig, MIN_CLIENT_BUFFER_SIZE};
pub use error::ServerError;
pub use routes::{routes, RelayContext};
pub use server::RelayServer;
