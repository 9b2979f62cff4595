//! Integration tests for the HTTP API.
//!
//! These run the full filter tree against a live relay hub through the
//! warp test harness, without binding a socket.

use std::sync::Arc;

use broker_bridge::{BrokerPublisher, PublishError};
use bytes::Bytes;
use relay_hub::{initial_store, HubConfig, HubHandle, RelayHub, TopicTable};
use relay_server::{routes, RelayContext, ServerConfig};
use serde_json::{json, Value};
use warp::http::StatusCode;

struct NullPublisher;

impl BrokerPublisher for NullPublisher {
    fn publish(&self, _topic: &str, _payload: Bytes) -> Result<(), PublishError> {
        Ok(())
    }
}

fn start_hub() -> HubHandle {
    let store = initial_store();
    let (handle, inbox) = HubHandle::channel(64, store.reader());
    RelayHub::new(
        store,
        TopicTable::default(),
        Arc::new(NullPublisher),
        &HubConfig::default(),
    )
    .spawn(inbox);
    handle
}

fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("response body is JSON")
}

#[tokio::test]
async fn test_ping_and_health() {
    let api = routes(RelayContext::new(start_hub(), 16), &ServerConfig::default());

    let response = warp::test::request().path("/ping").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response.body()), json!({"message": "pong"}));

    let response = warp::test::request().path("/health").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response.body()), json!({"status": "ok"}));
}

#[tokio::test]
async fn test_health_does_not_depend_on_hub() {
    let store = initial_store();
    let (hub, inbox) = HubHandle::channel(1, store.reader());
    drop(inbox);
    let api = routes(RelayContext::new(hub, 16), &ServerConfig::default());

    let response = warp::test::request().path("/health").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_state_returns_seeded_records() {
    let api = routes(RelayContext::new(start_hub(), 16), &ServerConfig::default());

    let response = warp::test::request().path("/state").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);

    let records = body_json(response.body());
    let keys: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["color", "power", "nav"]);
    assert_eq!(records[0]["value"], "#ffffff");
    assert_eq!(records[1]["value"], "off");
    assert_eq!(records[2]["value"], json!({"direction": null, "pressed": false}));
}

#[tokio::test]
async fn test_get_state_by_key() {
    let api = routes(RelayContext::new(start_hub(), 16), &ServerConfig::default());

    let response = warp::test::request().path("/state/power").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
    let record = body_json(response.body());
    assert_eq!(record["key"], "power");
    assert_eq!(record["version"], 0);

    let response = warp::test::request().path("/state/volume").reply(&api).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response.body())["error"],
        "Unknown state key 'volume'"
    );
}

#[tokio::test]
async fn test_post_state_goes_through_hub() {
    let hub = start_hub();
    let api = routes(RelayContext::new(hub.clone(), 16), &ServerConfig::default());

    let response = warp::test::request()
        .method("POST")
        .path("/state")
        .json(&json!({"key": "color", "value": "#ff8800"}))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let record = body_json(response.body());
    assert_eq!(record["value"], "#ff8800");
    assert_eq!(record["version"], 1);

    let response = warp::test::request().path("/state/color").reply(&api).await;
    assert_eq!(body_json(response.body())["version"], 1);
}

#[tokio::test]
async fn test_post_state_rejects_invalid_input() {
    let api = routes(RelayContext::new(start_hub(), 16), &ServerConfig::default());

    let cases = [
        json!({"key": "power", "value": "sideways"}),
        json!({"key": "volume", "value": 3}),
        json!({"value": "on"}),
    ];
    for body in cases {
        let response = warp::test::request()
            .method("POST")
            .path("/state")
            .json(&body)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert!(body_json(response.body())["error"].is_string());
    }
}

#[tokio::test]
async fn test_post_state_without_hub_is_unavailable() {
    let store = initial_store();
    let (hub, inbox) = HubHandle::channel(1, store.reader());
    drop(inbox);
    let api = routes(RelayContext::new(hub, 16), &ServerConfig::default());

    let response = warp::test::request()
        .method("POST")
        .path("/state")
        .json(&json!({"key": "power", "value": "on"}))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_connections_starts_empty() {
    let api = routes(RelayContext::new(start_hub(), 16), &ServerConfig::default());

    let response = warp::test::request().path("/connections").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response.body()), json!({"connections": []}));
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let api = routes(RelayContext::new(start_hub(), 16), &ServerConfig::default());

    let response = warp::test::request().path("/recipes").reply(&api).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response.body())["error"], "Not found");

    let response = warp::test::request()
        .method("DELETE")
        .path("/state")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_cors_allows_configured_origin_only() {
    let api = routes(RelayContext::new(start_hub(), 16), &ServerConfig::default());

    let response = warp::test::request()
        .method("OPTIONS")
        .path("/state")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );

    let response = warp::test::request()
        .path("/state")
        .header("origin", "http://evil.example.com")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
