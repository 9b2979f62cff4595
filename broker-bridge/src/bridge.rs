//! The broker bridge and its publish handle

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{AsyncClient, QoS};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::backoff::Backoff;
use crate::config::BrokerConfig;
use crate::error::{BridgeError, PublishError, Result};
use crate::sink::InboundSink;
use crate::worker::Worker;

/// Connection state of the bridge
///
/// ```text
/// Disconnected -> Connecting -> Subscribed
///      ^              |             |
///      +--------------+-------------+   (on error, then retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Subscribed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeState::Disconnected => "disconnected",
            BridgeState::Connecting => "connecting",
            BridgeState::Subscribed => "subscribed",
        };
        f.write_str(name)
    }
}

/// Outbound path to the broker
///
/// Implementations must not block: the relay hub calls this from its
/// serialized event loop.
pub trait BrokerPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Bytes) -> std::result::Result<(), PublishError>;
}

/// Cloneable handle for publishing through a running bridge
#[derive(Clone)]
pub struct BrokerHandle {
    client: AsyncClient,
    state_rx: watch::Receiver<BridgeState>,
    qos: QoS,
}

impl BrokerHandle {
    /// Current connection state
    pub fn state(&self) -> BridgeState {
        *self.state_rx.borrow()
    }
}

impl BrokerPublisher for BrokerHandle {
    fn publish(&self, topic: &str, payload: Bytes) -> std::result::Result<(), PublishError> {
        let state = self.state();
        if state != BridgeState::Subscribed {
            return Err(PublishError::NotConnected(state));
        }

        self.client
            .try_publish(topic, self.qos, false, payload.to_vec())
            .map_err(|e| PublishError::Client(e.to_string()))
    }
}

impl fmt::Debug for BrokerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// Resilient connection to the external MQTT broker
///
/// The bridge runs on its own tokio task. Every inbound publish is handed to
/// the [`InboundSink`] exactly once; outbound publishes go through
/// [`BrokerBridge::publisher`].
///
/// # Example
///
/// ```no_run
/// use broker_bridge::{BrokerBridge, BrokerConfig, InboundMessage};
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), broker_bridge::BridgeError> {
///     let (tx, mut rx) = mpsc::channel::<InboundMessage>(256);
///     let config = BrokerConfig::new("localhost", 1883).with_subscriptions(["nav/+"]);
///
///     let bridge = BrokerBridge::spawn(config, tx)?;
///
///     while let Some(message) = rx.recv().await {
///         println!("{} -> {:?}", message.topic, message.payload);
///     }
///
///     bridge.shutdown().await
/// }
/// ```
pub struct BrokerBridge {
    handle: BrokerHandle,
    shutdown_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl BrokerBridge {
    /// Validate the configuration and start the bridge worker.
    ///
    /// No network I/O happens here; the first connection attempt is made by
    /// the worker, so an unreachable broker is not an error.
    pub fn spawn<S: InboundSink>(config: BrokerConfig, sink: S) -> Result<Self> {
        config.validate()?;
        let options = config.mqtt_options()?;

        let (client, eventloop) = AsyncClient::new(options, config.request_capacity);
        let (state_tx, state_rx) = watch::channel(BridgeState::Disconnected);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tracing::info!(
            "Starting broker bridge for {}:{} as {}",
            config.host,
            config.port,
            config.client_id
        );

        let worker = Worker {
            client: client.clone(),
            eventloop,
            sink,
            subscriptions: config.subscriptions,
            qos: config.qos,
            backoff: Backoff::new(config.reconnect),
            state_tx,
        };
        let worker = tokio::spawn(worker.run(shutdown_rx));

        Ok(Self {
            handle: BrokerHandle {
                client,
                state_rx,
                qos: config.qos,
            },
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Handle for publishing to the broker
    pub fn publisher(&self) -> BrokerHandle {
        self.handle.clone()
    }

    /// Current connection state
    pub fn state(&self) -> BridgeState {
        self.handle.state()
    }

    /// Watch channel observing state transitions
    pub fn state_changes(&self) -> watch::Receiver<BridgeState> {
        self.handle.state_rx.clone()
    }

    /// Stop reconnecting and release the broker connection.
    ///
    /// Waits up to 5 seconds for the worker; a worker that does not finish in
    /// time is aborted.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        let Some(mut worker) = self.worker.take() else {
            return Ok(());
        };

        match timeout(Duration::from_secs(5), &mut worker).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BridgeError::Shutdown(format!("Bridge worker panicked: {e}"))),
            Err(_) => {
                worker.abort();
                Err(BridgeError::Shutdown(
                    "Bridge worker shutdown timed out after 5 seconds".to_string(),
                ))
            }
        }
    }
}

impl Drop for BrokerBridge {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::ReconnectConfig;
    use crate::sink::InboundMessage;

    fn unreachable_config() -> BrokerConfig {
        // Port 1 on loopback refuses connections immediately
        BrokerConfig::new("127.0.0.1", 1)
            .with_subscriptions(["led/color", "nav/+"])
            .with_reconnect(ReconnectConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                multiplier: 2.0,
            })
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BridgeState::Disconnected.to_string(), "disconnected");
        assert_eq!(BridgeState::Connecting.to_string(), "connecting");
        assert_eq!(BridgeState::Subscribed.to_string(), "subscribed");
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_config() {
        let (tx, _rx) = mpsc::channel::<InboundMessage>(8);
        let config = BrokerConfig::new("127.0.0.1", 0);

        assert!(matches!(
            BrokerBridge::spawn(config, tx),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_broker_keeps_retrying() {
        let (tx, mut rx) = mpsc::channel::<InboundMessage>(8);
        let bridge = BrokerBridge::spawn(unreachable_config(), tx).unwrap();
        let mut changes = bridge.state_changes();

        // Wait for at least a few transitions; the worker must still be alive
        for _ in 0..4 {
            timeout(Duration::from_secs(5), changes.changed())
                .await
                .expect("Timeout waiting for state change")
                .expect("Bridge state channel closed");
        }

        assert_ne!(bridge.state(), BridgeState::Subscribed);
        assert!(rx.try_recv().is_err());

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_is_reported() {
        let (tx, _rx) = mpsc::channel::<InboundMessage>(8);
        let bridge = BrokerBridge::spawn(unreachable_config(), tx).unwrap();
        let publisher = bridge.publisher();

        let result = publisher.publish("relay/outbound", Bytes::from_static(b"hello"));
        assert!(matches!(result, Err(PublishError::NotConnected(_))));

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let (tx, _rx) = mpsc::channel::<InboundMessage>(8);
        let bridge = BrokerBridge::spawn(unreachable_config(), tx).unwrap();
        let changes = bridge.state_changes();

        bridge.shutdown().await.unwrap();

        assert_eq!(*changes.borrow(), BridgeState::Disconnected);
    }
}
