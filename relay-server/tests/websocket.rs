//! Integration tests for WebSocket sessions.
//!
//! Clients connect through the warp test harness to a live hub. Each client
//! first receives the full state snapshot, which doubles as proof that the
//! hub has registered it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use broker_bridge::{BrokerPublisher, InboundMessage, InboundSink, PublishError};
use bytes::Bytes;
use relay_hub::{initial_store, HubConfig, HubHandle, RelayHub, TopicTable};
use relay_server::{routes, RelayContext, ServerConfig};
use serde_json::Value;
use tokio::time::timeout;
use warp::test::WsClient;

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, Bytes)>>,
}

impl BrokerPublisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}

struct Harness {
    hub: HubHandle,
    ctx: RelayContext,
    publisher: Arc<RecordingPublisher>,
}

impl Harness {
    fn start() -> Self {
        let store = initial_store();
        let publisher = Arc::new(RecordingPublisher::default());
        let (hub, inbox) = HubHandle::channel(64, store.reader());
        RelayHub::new(
            store,
            TopicTable::default(),
            publisher.clone(),
            &HubConfig::default(),
        )
        .spawn(inbox);
        let ctx = RelayContext::new(hub.clone(), 16);
        Self {
            hub,
            ctx,
            publisher,
        }
    }

    /// Connect a client and consume its join snapshot
    async fn connect(&self) -> (WsClient, Vec<Value>) {
        let api = routes(self.ctx.clone(), &ServerConfig::default());
        let mut client = warp::test::ws()
            .path("/ws")
            .handshake(api)
            .await
            .expect("handshake");

        let mut snapshot = Vec::new();
        for _ in 0..3 {
            snapshot.push(recv_json(&mut client).await);
        }
        (client, snapshot)
    }
}

async fn recv_json(client: &mut WsClient) -> Value {
    let message = timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("timed out waiting for message")
        .expect("websocket error");
    serde_json::from_str(message.to_str().expect("text frame")).expect("JSON frame")
}

async fn recv_text(client: &mut WsClient) -> String {
    let message = timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("timed out waiting for message")
        .expect("websocket error");
    message.to_str().expect("text frame").to_string()
}

async fn assert_silent(client: &mut WsClient) {
    assert!(
        timeout(Duration::from_millis(100), client.recv()).await.is_err(),
        "client received an unexpected message"
    );
}

#[tokio::test]
async fn test_client_receives_snapshot_on_connect() {
    let harness = Harness::start();
    let (_client, snapshot) = harness.connect().await;

    let keys: Vec<&str> = snapshot.iter().map(|m| m["key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["color", "power", "nav"]);
    assert!(snapshot.iter().all(|m| m["type"] == "state" && m["version"] == 0));
}

#[tokio::test]
async fn test_chat_reaches_peer_but_not_sender() {
    let harness = Harness::start();
    let (mut a, _) = harness.connect().await;
    let (mut b, _) = harness.connect().await;

    a.send_text("hello").await;

    assert_eq!(recv_text(&mut b).await, "hello");
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_broker_update_reaches_every_client() {
    let harness = Harness::start();
    let (mut a, _) = harness.connect().await;
    let (mut b, _) = harness.connect().await;

    harness
        .hub
        .deliver(InboundMessage::new("nav/up", "1"))
        .unwrap();

    for client in [&mut a, &mut b] {
        let message = recv_json(client).await;
        assert_eq!(message["key"], "nav");
        assert_eq!(message["version"], 1);
        assert_eq!(message["value"]["direction"], "up");
        assert_eq!(message["value"]["pressed"], true);
    }
}

#[tokio::test]
async fn test_set_from_client_is_broadcast_to_all() {
    let harness = Harness::start();
    let (mut a, _) = harness.connect().await;
    let (mut b, _) = harness.connect().await;

    a.send_text(r#"{"type":"set","key":"power","value":"on"}"#).await;

    for client in [&mut a, &mut b] {
        let message = recv_json(client).await;
        assert_eq!(message["key"], "power");
        assert_eq!(message["value"], "on");
    }
}

#[tokio::test]
async fn test_publish_is_forwarded_to_broker() {
    let harness = Harness::start();
    let (mut a, _) = harness.connect().await;
    let (mut b, _) = harness.connect().await;

    let frame = r#"{"type":"publish","payload":"beep"}"#;
    a.send_text(frame).await;

    assert_eq!(recv_text(&mut b).await, frame);
    let published = harness.publisher.published.lock().unwrap().clone();
    assert_eq!(
        published,
        vec![("relay/outbound".to_string(), Bytes::from_static(b"beep"))]
    );
}

#[tokio::test]
async fn test_closed_client_is_unregistered() {
    let harness = Harness::start();
    let (a, _) = harness.connect().await;
    let (_b, _) = harness.connect().await;
    assert_eq!(harness.hub.connections().await.unwrap().len(), 2);

    drop(a);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if harness.hub.connections().await.unwrap().len() == 1 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "connection was not removed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
