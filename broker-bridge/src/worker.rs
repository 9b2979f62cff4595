//! Background task driving the MQTT event loop
//!
//! The worker owns the rumqttc `EventLoop` and:
//! - Reissues the subscription set after every ConnAck
//! - Hands inbound publishes to the sink without blocking
//! - Backs off and retries forever after connection errors
//! - Publishes its connection state through a watch channel

use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, Outgoing, Packet, QoS, SubAck, SubscribeFilter,
    SubscribeReasonCode,
};
use tokio::sync::{mpsc, watch};

use crate::backoff::Backoff;
use crate::error::DeliveryError;
use crate::sink::{InboundMessage, InboundSink};
use crate::BridgeState;

/// How long a graceful disconnect may take during shutdown
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

pub(crate) struct Worker<S> {
    pub(crate) client: AsyncClient,
    pub(crate) eventloop: EventLoop,
    pub(crate) sink: S,
    pub(crate) subscriptions: Vec<String>,
    pub(crate) qos: QoS,
    pub(crate) backoff: Backoff,
    pub(crate) state_tx: watch::Sender<BridgeState>,
}

impl<S: InboundSink> Worker<S> {
    /// Main loop; returns once a shutdown signal arrives or the signal sender is dropped
    pub(crate) async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(
            subscriptions = self.subscriptions.len(),
            "Broker bridge worker started"
        );

        loop {
            if self.state() == BridgeState::Disconnected {
                self.transition(BridgeState::Connecting);
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Broker bridge received shutdown signal");
                    break;
                }
                event = self.eventloop.poll() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(e) => {
                        self.transition(BridgeState::Disconnected);
                        let delay = self.backoff.next_delay();
                        tracing::warn!(
                            "Broker connection error: {} (attempt {}, retrying in {:?})",
                            e,
                            self.backoff.attempts(),
                            delay
                        );

                        tokio::select! {
                            _ = shutdown_rx.recv() => {
                                tracing::info!("Broker bridge received shutdown signal while backing off");
                                break;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        self.disconnect().await;
        tracing::info!("Broker bridge worker shut down");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                tracing::info!("Connected to broker (session present: {})", ack.session_present);
                self.backoff.reset();
                self.subscribe_all();
            }
            Event::Incoming(Packet::SubAck(ack)) => self.handle_suback(&ack),
            Event::Incoming(Packet::Publish(publish)) => {
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload,
                };
                let topic = message.topic.clone();

                match self.sink.deliver(message) {
                    Ok(()) => tracing::trace!("Forwarded broker message on {}", topic),
                    Err(DeliveryError::Full) => {
                        tracing::warn!("Hub queue full, dropping broker message on {}", topic)
                    }
                    Err(DeliveryError::Closed) => {
                        tracing::debug!("Hub queue closed, dropping broker message on {}", topic)
                    }
                }
            }
            _ => {}
        }
    }

    /// Only move to Subscribed if the broker accepted at least one filter
    fn handle_suback(&self, ack: &SubAck) {
        let refused = refused_filters(&self.subscriptions, &ack.return_codes);
        for filter in &refused {
            tracing::warn!("Broker refused subscription to {}", filter);
        }

        if !ack.return_codes.is_empty() && refused.len() == ack.return_codes.len() {
            tracing::error!(
                "Broker refused all {} subscriptions; no messages will arrive",
                refused.len()
            );
            return;
        }

        self.transition(BridgeState::Subscribed);
    }

    /// Issue the full subscription set; nothing survives a reconnect
    fn subscribe_all(&mut self) {
        if self.subscriptions.is_empty() {
            self.transition(BridgeState::Subscribed);
            return;
        }

        let filters = self
            .subscriptions
            .iter()
            .map(|filter| SubscribeFilter::new(filter.clone(), self.qos));

        match self.client.try_subscribe_many(filters) {
            Ok(()) => tracing::debug!("Requested {} subscriptions", self.subscriptions.len()),
            Err(e) => tracing::warn!("Failed to request subscriptions: {}", e),
        }
    }

    async fn disconnect(&mut self) {
        let was_connected = self.state() != BridgeState::Disconnected;
        self.transition(BridgeState::Disconnected);

        if !was_connected || self.client.try_disconnect().is_err() {
            return;
        }

        // Drive the loop just long enough to flush the DISCONNECT packet
        let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            tracing::debug!("Broker disconnect did not flush within {:?}", DISCONNECT_GRACE);
        }
    }

    fn state(&self) -> BridgeState {
        *self.state_tx.borrow()
    }

    fn transition(&self, next: BridgeState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            tracing::debug!("Broker bridge state: {} -> {}", previous, next);
        }
    }
}

/// Filters whose SUBACK return code is a failure, matched by position
fn refused_filters<'a>(filters: &'a [String], codes: &[SubscribeReasonCode]) -> Vec<&'a str> {
    filters
        .iter()
        .zip(codes)
        .filter(|(_, code)| matches!(code, SubscribeReasonCode::Failure))
        .map(|(filter, _)| filter.as_str())
        .collect()
}
