//! The relay hub
//!
//! A single task drains the hub queue and handles one message at a time. It
//! is the only writer of the state store and the only caller of
//! [`ConnectionRegistry::broadcast`], so record versions are linear and
//! every connection observes updates in the same order.

use std::sync::Arc;

use broker_bridge::{BrokerPublisher, PublishError};
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::{self, ClientMessage};
use crate::connection::{Connection, ConnectionId, Payload};
use crate::error::{DecodeError, RelayError};
use crate::event::{HubCommand, HubMessage, RelayEvent};
use crate::registry::{ConnectionRegistry, DeliveryReport};
use crate::state::{RelayRecord, RelayStore, StateKey, StateValue};
use crate::topics::TopicTable;

/// Configuration for the relay hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the hub queue shared by the bridge, clients and HTTP
    ///
    /// Default: 1024
    pub queue_capacity: usize,

    /// Broker topic client `publish` messages are forwarded to
    ///
    /// Default: "relay/outbound"
    pub outbound_topic: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            outbound_topic: "relay/outbound".to_string(),
        }
    }
}

impl HubConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }
        if self.outbound_topic.is_empty() {
            return Err("outbound_topic must not be empty".to_string());
        }
        if self.outbound_topic.contains(['+', '#']) {
            return Err(format!(
                "outbound_topic '{}' must not contain wildcards",
                self.outbound_topic
            ));
        }
        Ok(())
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_outbound_topic(mut self, topic: impl Into<String>) -> Self {
        self.outbound_topic = topic.into();
        self
    }
}

/// What handling one event did
#[derive(Debug)]
pub enum EventOutcome {
    /// A state record was written and fanned out to every connection
    Applied {
        record: RelayRecord,
        report: DeliveryReport,
    },
    /// A client frame was relayed to its peers, and possibly to the broker
    Forwarded {
        report: DeliveryReport,
        published: Option<Result<(), PublishError>>,
    },
    /// A connection was registered and sent the current snapshot
    Joined {
        connection_id: ConnectionId,
        snapshot_len: usize,
    },
    /// A connection could not be registered or could not take its snapshot
    Rejected(RelayError),
    /// A connection was unregistered
    Closed {
        connection_id: ConnectionId,
        was_registered: bool,
    },
    /// An inbound payload was discarded without side effects
    Dropped(DecodeError),
    /// A frame from a connection that is no longer registered
    Ignored(ConnectionId),
}

impl EventOutcome {
    fn log(&self) {
        match self {
            EventOutcome::Applied { record, report } => {
                tracing::debug!(
                    key = %record.key,
                    version = record.version,
                    delivered = report.delivered.len(),
                    "State applied"
                );
                log_dropped(report);
            }
            EventOutcome::Forwarded { report, published } => {
                tracing::debug!(
                    delivered = report.delivered.len(),
                    published = published.as_ref().map(Result::is_ok),
                    "Client message forwarded"
                );
                log_dropped(report);
                if let Some(Err(e)) = published {
                    tracing::warn!("Failed to publish client message to broker: {}", e);
                }
            }
            EventOutcome::Joined {
                connection_id,
                snapshot_len,
            } => {
                tracing::debug!(%connection_id, snapshot_len, "Connection joined");
            }
            EventOutcome::Rejected(e) => {
                tracing::warn!("Connection rejected: {}", e);
            }
            EventOutcome::Closed {
                connection_id,
                was_registered,
            } => {
                tracing::debug!(%connection_id, was_registered, "Connection closed");
            }
            EventOutcome::Dropped(e) => {
                tracing::warn!("Dropping inbound message: {}", e);
            }
            EventOutcome::Ignored(connection_id) => {
                tracing::debug!(%connection_id, "Ignoring frame from unregistered connection");
            }
        }
    }
}

fn log_dropped(report: &DeliveryReport) {
    for (connection_id, e) in &report.dropped {
        tracing::warn!(%connection_id, "Dropping connection after failed send: {}", e);
    }
}

/// Serialized owner of the state store and connection registry
pub struct RelayHub {
    store: RelayStore,
    registry: ConnectionRegistry,
    topics: TopicTable,
    publisher: Arc<dyn BrokerPublisher>,
    outbound_topic: String,
}

impl RelayHub {
    /// Create a hub owning `store`
    ///
    /// Readers of the store should be taken with [`RelayStore::reader`]
    /// before the store is handed over.
    pub fn new(
        store: RelayStore,
        topics: TopicTable,
        publisher: Arc<dyn BrokerPublisher>,
        config: &HubConfig,
    ) -> Self {
        Self {
            store,
            registry: ConnectionRegistry::new(),
            topics,
            publisher,
            outbound_topic: config.outbound_topic.clone(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &RelayStore {
        &self.store
    }

    /// Run the hub on its own task
    pub fn spawn(self, inbox: mpsc::Receiver<HubMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(inbox))
    }

    /// Drain `inbox` until every sender is dropped
    pub async fn run(mut self, mut inbox: mpsc::Receiver<HubMessage>) {
        tracing::info!(keys = self.store.len(), "Relay hub started");

        while let Some(message) = inbox.recv().await {
            match message {
                HubMessage::Event(event) => self.handle_event(event).log(),
                HubMessage::Command(command) => self.handle_command(command),
            }
        }

        tracing::info!(
            connections = self.registry.len(),
            "Relay hub stopped, all senders dropped"
        );
    }

    /// Handle one relay event
    pub fn handle_event(&mut self, event: RelayEvent) -> EventOutcome {
        match event {
            RelayEvent::BrokerInbound { topic, payload } => self.on_broker_inbound(&topic, &payload),
            RelayEvent::ClientInbound {
                connection_id,
                payload,
            } => self.on_client_inbound(connection_id, payload),
            RelayEvent::ConnectionOpened { connection } => self.on_connection_opened(connection),
            RelayEvent::ConnectionClosed { connection_id } => {
                let was_registered = self.registry.unregister(connection_id).is_some();
                EventOutcome::Closed {
                    connection_id,
                    was_registered,
                }
            }
        }
    }

    /// Handle one command, replying on its channel
    ///
    /// A reply whose receiver has gone away is discarded.
    pub fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::ApplyState { key, value, reply } => {
                let result = self.apply_json(&key, value);
                match &result {
                    Ok(record) => tracing::debug!(
                        key = %record.key,
                        version = record.version,
                        "State applied from command"
                    ),
                    Err(e) => tracing::warn!("Rejected state command for '{}': {}", key, e),
                }
                let _ = reply.send(result);
            }
            HubCommand::Connections { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    fn on_broker_inbound(&mut self, topic: &str, payload: &Bytes) -> EventOutcome {
        let Some(key) = self.topics.resolve(topic) else {
            return EventOutcome::Dropped(DecodeError::UnknownTopic(topic.to_string()));
        };

        match codec::decode_broker_payload(key, topic, payload) {
            Ok(value) => {
                let (record, report) = self.apply(key, value);
                EventOutcome::Applied { record, report }
            }
            Err(e) => EventOutcome::Dropped(e),
        }
    }

    fn on_client_inbound(&mut self, connection_id: ConnectionId, payload: Payload) -> EventOutcome {
        if !self.registry.contains(connection_id) {
            return EventOutcome::Ignored(connection_id);
        }

        let message = match &payload {
            Payload::Text(text) => match codec::decode_client_text(text) {
                Ok(message) => message,
                Err(e) => return EventOutcome::Dropped(e),
            },
            Payload::Binary(_) => ClientMessage::PassThrough,
        };

        match message {
            ClientMessage::Set { key, value } => {
                let (record, report) = self.apply(key, value);
                EventOutcome::Applied { record, report }
            }
            ClientMessage::Publish { payload: outbound } => {
                let published = self
                    .publisher
                    .publish(&self.outbound_topic, Bytes::from(outbound));
                let report = self.registry.broadcast(&payload, &[connection_id]);
                EventOutcome::Forwarded {
                    report,
                    published: Some(published),
                }
            }
            ClientMessage::PassThrough => EventOutcome::Forwarded {
                report: self.registry.broadcast(&payload, &[connection_id]),
                published: None,
            },
        }
    }

    fn on_connection_opened(&mut self, connection: Connection) -> EventOutcome {
        let connection_id = connection.id();
        if let Err(e) = self.registry.register(connection) {
            return EventOutcome::Rejected(e.into());
        }

        let snapshot = self.store.snapshot();
        for record in &snapshot {
            let encoded = match codec::encode_record(record) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::error!(key = %record.key, "Failed to encode record: {}", e);
                    continue;
                }
            };
            if let Err(e) = self.registry.send_to(connection_id, Payload::Text(encoded)) {
                return EventOutcome::Rejected(RelayError::from_send(connection_id, e));
            }
        }

        EventOutcome::Joined {
            connection_id,
            snapshot_len: snapshot.len(),
        }
    }

    fn apply_json(&mut self, key: &str, value: Value) -> Result<RelayRecord, RelayError> {
        let key = key.parse::<StateKey>()?;
        let value = codec::decode_json_value(key, value)?;
        let (record, report) = self.apply(key, value);
        log_dropped(&report);
        Ok(record)
    }

    fn apply(&mut self, key: StateKey, value: StateValue) -> (RelayRecord, DeliveryReport) {
        let record = self.store.set(key, value);
        let report = match codec::encode_record(&record) {
            Ok(encoded) => self.registry.broadcast(&Payload::Text(encoded), &[]),
            Err(e) => {
                tracing::error!(key = %record.key, "Failed to encode record: {}", e);
                DeliveryReport::default()
            }
        };
        (record, report)
    }
}

impl std::fmt::Debug for RelayHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayHub")
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("topics", &self.topics)
            .field("outbound_topic", &self.outbound_topic)
            .finish()
    }
}
