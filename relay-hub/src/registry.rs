//! Connection registry
//!
//! Owns every live [`Connection`] and fans payloads out to them. Sends never
//! wait: a connection whose buffer is full or closed is dropped from the
//! registry and delivery continues with the rest.

use crate::connection::{Connection, ConnectionId, Payload};
use crate::error::{RegistryError, SendError};

/// Result of a fan-out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections the payload was queued on, in registration order
    pub delivered: Vec<ConnectionId>,
    /// Connections that failed and were removed
    pub dropped: Vec<(ConnectionId, SendError)>,
}

impl DeliveryReport {
    /// Whether every targeted connection accepted the payload
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Set of live connections, kept in registration order
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection
    ///
    /// Fails if the id is already registered; the existing connection is
    /// left untouched.
    pub fn register(&mut self, connection: Connection) -> Result<(), RegistryError> {
        if self.contains(connection.id()) {
            return Err(RegistryError::DuplicateId(connection.id()));
        }
        self.connections.push(connection);
        Ok(())
    }

    /// Remove a connection, returning it if it was registered
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id() == id)?;
        Some(self.connections.remove(index))
    }

    /// Queue `payload` on one connection, removing it on failure
    ///
    /// Sending to an unknown id reports [`SendError::Closed`].
    pub fn send_to(&mut self, id: ConnectionId, payload: Payload) -> Result<(), SendError> {
        let Some(connection) = self.connections.iter().find(|c| c.id() == id) else {
            return Err(SendError::Closed);
        };

        let result = connection.try_send(payload);
        if result.is_err() {
            self.unregister(id);
        }
        result
    }

    /// Queue `payload` on every connection not listed in `exclude`
    pub fn broadcast(&mut self, payload: &Payload, exclude: &[ConnectionId]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for connection in &self.connections {
            let id = connection.id();
            if exclude.contains(&id) {
                continue;
            }
            match connection.try_send(payload.clone()) {
                Ok(()) => report.delivered.push(id),
                Err(e) => report.dropped.push((id, e)),
            }
        }

        if !report.dropped.is_empty() {
            self.connections
                .retain(|c| !report.dropped.iter().any(|(id, _)| *id == c.id()));
        }

        report
    }

    /// Registered ids in registration order
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(Connection::id).collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.iter().any(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    fn connect(
        registry: &mut ConnectionRegistry,
        id: u64,
        capacity: usize,
    ) -> mpsc::Receiver<Payload> {
        let (connection, rx) = Connection::channel(ConnectionId::new(id), capacity);
        registry.register(connection).unwrap();
        rx
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let mut registry = ConnectionRegistry::new();
        let mut original_rx = connect(&mut registry, 1, 4);

        let (duplicate, _rx) = Connection::channel(ConnectionId::new(1), 4);
        assert_eq!(
            registry.register(duplicate),
            Err(RegistryError::DuplicateId(ConnectionId::new(1)))
        );

        // The original connection still receives
        registry.broadcast(&"ping".into(), &[]);
        assert_eq!(original_rx.try_recv().unwrap(), Payload::from("ping"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let _a = connect(&mut registry, 1, 4);
        let _b = connect(&mut registry, 2, 4);

        assert!(registry.unregister(ConnectionId::new(1)).is_some());
        let after_once = registry.snapshot();
        assert!(registry.unregister(ConnectionId::new(1)).is_none());

        assert_eq!(registry.snapshot(), after_once);
        assert_eq!(after_once, vec![ConnectionId::new(2)]);
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut registry = ConnectionRegistry::new();
        let mut a = connect(&mut registry, 1, 4);
        let mut b = connect(&mut registry, 2, 4);

        let report = registry.broadcast(&"hello".into(), &[ConnectionId::new(1)]);

        assert_eq!(report.delivered, vec![ConnectionId::new(2)]);
        assert!(report.is_clean());
        assert_eq!(b.try_recv().unwrap(), Payload::from("hello"));
        assert!(a.try_recv().is_err());
    }

    #[test]
    fn test_failed_connection_is_removed_and_others_still_receive() {
        let mut registry = ConnectionRegistry::new();
        let a = connect(&mut registry, 1, 4);
        let mut b = connect(&mut registry, 2, 4);
        drop(a);

        let report = registry.broadcast(&"update".into(), &[]);

        assert_eq!(report.dropped, vec![(ConnectionId::new(1), SendError::Closed)]);
        assert_eq!(report.delivered, vec![ConnectionId::new(2)]);
        assert_eq!(b.try_recv().unwrap(), Payload::from("update"));
        assert!(!registry.contains(ConnectionId::new(1)));
    }

    #[test]
    fn test_full_buffer_drops_connection() {
        let mut registry = ConnectionRegistry::new();
        let _slow = connect(&mut registry, 1, 1);

        registry.broadcast(&"first".into(), &[]);
        let report = registry.broadcast(&"second".into(), &[]);

        assert_eq!(
            report.dropped,
            vec![(ConnectionId::new(1), SendError::CapacityExceeded)]
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_targets_one_connection() {
        let mut registry = ConnectionRegistry::new();
        let mut a = connect(&mut registry, 1, 4);
        let mut b = connect(&mut registry, 2, 4);

        registry.send_to(ConnectionId::new(2), "only-b".into()).unwrap();

        assert!(a.try_recv().is_err());
        assert_eq!(b.try_recv().unwrap(), Payload::from("only-b"));
        assert_eq!(
            registry.send_to(ConnectionId::new(9), "nobody".into()),
            Err(SendError::Closed)
        );
    }

    proptest! {
        #[test]
        fn prop_broadcast_delivers_once_to_every_non_excluded(
            count in 1u64..12,
            excluded in proptest::collection::vec(1u64..12, 0..4),
        ) {
            let mut registry = ConnectionRegistry::new();
            let mut receivers: Vec<_> = (1..=count)
                .map(|id| (id, connect(&mut registry, id, 4)))
                .collect();
            let exclude: Vec<_> = excluded.iter().copied().map(ConnectionId::new).collect();

            let report = registry.broadcast(&"msg".into(), &exclude);

            for (id, rx) in receivers.iter_mut() {
                let mut received = 0;
                while rx.try_recv().is_ok() {
                    received += 1;
                }
                let expected = if excluded.contains(id) { 0 } else { 1 };
                prop_assert_eq!(received, expected);
            }
            prop_assert!(report.is_clean());
            prop_assert_eq!(registry.len() as u64, count);
        }
    }
}
