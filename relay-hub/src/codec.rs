//! Decoding of broker and client payloads, encoding of state records
//!
//! Broker payloads are plain text per key:
//!
//! | Key     | Topic        | Payload                                 |
//! |---------|--------------|-----------------------------------------|
//! | `color` | `led/color`  | any non-empty string up to 64 chars     |
//! | `power` | `led/power`  | `on`, `off`, `1`, `0`, `true`, `false`  |
//! | `nav`   | `nav/<dir>`  | `1` pressed, `0` released               |
//!
//! Client frames are JSON objects tagged by `type`; anything that is not a
//! recognized message is passed through untouched.

use broker_bridge::topic;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;
use crate::state::{Direction, NavState, Power, RelayRecord, StateKey, StateValue};

/// Longest accepted color value, in characters
pub const MAX_COLOR_LEN: usize = 64;

/// A decoded client frame
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `{"type":"set","key":K,"value":V}`
    Set { key: StateKey, value: StateValue },
    /// `{"type":"publish","payload":P}`
    Publish { payload: String },
    /// Anything else, relayed verbatim to peers
    PassThrough,
}

#[derive(Deserialize)]
struct SetFrame {
    key: String,
    value: Value,
}

/// Messages the relay sends to clients
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage<'a> {
    State(&'a RelayRecord),
}

/// Decode a broker payload for `key`, using `topic_name` where the key
/// carries part of its value in the topic
pub fn decode_broker_payload(
    key: StateKey,
    topic_name: &str,
    payload: &[u8],
) -> Result<StateValue, DecodeError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| DecodeError::InvalidUtf8)?
        .trim();

    match key {
        StateKey::Color => parse_color(text),
        StateKey::Power => parse_power(text).map(StateValue::Power),
        StateKey::Nav => {
            let direction = topic::last_level(topic_name).parse::<Direction>()?;
            let pressed = parse_pressed(text)?;
            Ok(StateValue::Nav(NavState {
                direction: Some(direction),
                pressed,
            }))
        }
    }
}

/// Decode a JSON value supplied by a client or the HTTP API for `key`
pub fn decode_json_value(key: StateKey, value: Value) -> Result<StateValue, DecodeError> {
    match (key, value) {
        (StateKey::Color, Value::String(text)) => parse_color(text.trim()),
        (StateKey::Power, Value::String(text)) => parse_power(text.trim()).map(StateValue::Power),
        (StateKey::Power, Value::Bool(on)) => {
            Ok(StateValue::Power(if on { Power::On } else { Power::Off }))
        }
        (StateKey::Nav, value @ Value::Object(_)) => serde_json::from_value::<NavState>(value)
            .map(StateValue::Nav)
            .map_err(|e| invalid(StateKey::Nav, e.to_string())),
        (key, other) => Err(invalid(key, format!("unexpected JSON value {other}"))),
    }
}

/// Decode a text frame received from a client
///
/// Returns [`ClientMessage::PassThrough`] for anything that is not a JSON
/// object with a recognized `type`. A recognized but malformed message is a
/// [`DecodeError`].
pub fn decode_client_text(text: &str) -> Result<ClientMessage, DecodeError> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) else {
        return Ok(ClientMessage::PassThrough);
    };

    match map.get("type").and_then(Value::as_str) {
        Some("set") => {
            let frame: SetFrame = serde_json::from_value(Value::Object(map))?;
            let key = frame.key.parse::<StateKey>()?;
            let value = decode_json_value(key, frame.value)?;
            Ok(ClientMessage::Set { key, value })
        }
        Some("publish") => match map.get("payload") {
            Some(Value::String(payload)) => Ok(ClientMessage::Publish {
                payload: payload.clone(),
            }),
            Some(Value::Null) | None => Err(DecodeError::Json(
                "publish message is missing a payload".to_string(),
            )),
            Some(other) => Ok(ClientMessage::Publish {
                payload: other.to_string(),
            }),
        },
        _ => Ok(ClientMessage::PassThrough),
    }
}

/// Encode a record as the `state` message sent to clients
pub fn encode_record(record: &RelayRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerMessage::State(record))
}

fn parse_color(text: &str) -> Result<StateValue, DecodeError> {
    if text.is_empty() {
        return Err(invalid(StateKey::Color, "empty color"));
    }
    if text.chars().count() > MAX_COLOR_LEN {
        return Err(invalid(
            StateKey::Color,
            format!("longer than {MAX_COLOR_LEN} characters"),
        ));
    }
    if text.chars().any(char::is_control) {
        return Err(invalid(StateKey::Color, "contains control characters"));
    }
    Ok(StateValue::Color(text.to_string()))
}

fn parse_power(text: &str) -> Result<Power, DecodeError> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(Power::On),
        "off" | "0" | "false" => Ok(Power::Off),
        other => Err(invalid(
            StateKey::Power,
            format!("expected on or off, got '{other}'"),
        )),
    }
}

fn parse_pressed(text: &str) -> Result<bool, DecodeError> {
    match text {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(invalid(
            StateKey::Nav,
            format!("expected 1 or 0, got '{other}'"),
        )),
    }
}

fn invalid(key: StateKey, reason: impl Into<String>) -> DecodeError {
    DecodeError::InvalidValue {
        key,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use state_store::StateRecord;

    #[rstest]
    #[case("on", Power::On)]
    #[case("OFF", Power::Off)]
    #[case("1", Power::On)]
    #[case("0", Power::Off)]
    #[case(" True ", Power::On)]
    #[case("false", Power::Off)]
    fn test_decode_power(#[case] payload: &str, #[case] expected: Power) {
        assert_eq!(
            decode_broker_payload(StateKey::Power, "led/power", payload.as_bytes()).unwrap(),
            StateValue::Power(expected)
        );
    }

    #[rstest]
    #[case(StateKey::Power, "led/power", "maybe")]
    #[case(StateKey::Color, "led/color", "   ")]
    #[case(StateKey::Nav, "nav/up", "2")]
    #[case(StateKey::Nav, "nav/sideways", "1")]
    fn test_decode_rejects_invalid(
        #[case] key: StateKey,
        #[case] topic_name: &str,
        #[case] payload: &str,
    ) {
        assert!(matches!(
            decode_broker_payload(key, topic_name, payload.as_bytes()),
            Err(DecodeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_decode_nav_takes_direction_from_topic() {
        let value = decode_broker_payload(StateKey::Nav, "nav/left", b"1").unwrap();
        assert_eq!(
            value,
            StateValue::Nav(NavState {
                direction: Some(Direction::Left),
                pressed: true,
            })
        );

        let value = decode_broker_payload(StateKey::Nav, "nav/left", b"0").unwrap();
        assert!(matches!(value, StateValue::Nav(NavState { pressed: false, .. })));
    }

    #[test]
    fn test_decode_color() {
        assert_eq!(
            decode_broker_payload(StateKey::Color, "led/color", b" #ff8800\n").unwrap(),
            StateValue::Color("#ff8800".to_string())
        );

        let too_long = "x".repeat(MAX_COLOR_LEN + 1);
        assert!(decode_broker_payload(StateKey::Color, "led/color", too_long.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert_eq!(
            decode_broker_payload(StateKey::Color, "led/color", &[0xff, 0xfe]),
            Err(DecodeError::InvalidUtf8)
        );
    }

    #[test]
    fn test_decode_client_set() {
        let message = decode_client_text(r#"{"type":"set","key":"power","value":"on"}"#).unwrap();
        assert_eq!(
            message,
            ClientMessage::Set {
                key: StateKey::Power,
                value: StateValue::Power(Power::On),
            }
        );

        let message = decode_client_text(
            r#"{"type":"set","key":"nav","value":{"direction":"down","pressed":true}}"#,
        )
        .unwrap();
        assert!(matches!(message, ClientMessage::Set { key: StateKey::Nav, .. }));
    }

    #[rstest]
    #[case(r#"{"type":"set","key":"volume","value":3}"#)]
    #[case(r#"{"type":"set","key":"power"}"#)]
    #[case(r#"{"type":"set","key":"power","value":42}"#)]
    #[case(r#"{"type":"publish"}"#)]
    fn test_decode_client_malformed(#[case] text: &str) {
        assert!(decode_client_text(text).is_err());
    }

    #[rstest]
    #[case("hello")]
    #[case(r#"{"type":"chat","text":"hi"}"#)]
    #[case(r#"[1,2,3]"#)]
    #[case(r#"{"no_type":true}"#)]
    fn test_decode_client_pass_through(#[case] text: &str) {
        assert_eq!(decode_client_text(text).unwrap(), ClientMessage::PassThrough);
    }

    #[test]
    fn test_decode_client_publish() {
        assert_eq!(
            decode_client_text(r#"{"type":"publish","payload":"beep"}"#).unwrap(),
            ClientMessage::Publish {
                payload: "beep".to_string()
            }
        );
        assert_eq!(
            decode_client_text(r#"{"type":"publish","payload":{"n":1}}"#).unwrap(),
            ClientMessage::Publish {
                payload: r#"{"n":1}"#.to_string()
            }
        );
    }

    #[test]
    fn test_nav_direction_case_matches_broker_path() {
        let from_broker = decode_broker_payload(StateKey::Nav, "nav/UP", b"1").unwrap();
        let from_client = decode_client_text(
            r#"{"type":"set","key":"nav","value":{"direction":"UP","pressed":true}}"#,
        )
        .unwrap();

        assert_eq!(
            from_client,
            ClientMessage::Set {
                key: StateKey::Nav,
                value: from_broker,
            }
        );
    }

    #[test]
    fn test_decode_json_value_power_bool() {
        assert_eq!(
            decode_json_value(StateKey::Power, json!(true)).unwrap(),
            StateValue::Power(Power::On)
        );
    }

    #[test]
    fn test_encode_record() {
        let record = StateRecord::initial(StateKey::Power, StateValue::Power(Power::On)).next(
            StateValue::Power(Power::On),
        );
        let encoded: Value = serde_json::from_str(&encode_record(&record).unwrap()).unwrap();

        assert_eq!(encoded["type"], "state");
        assert_eq!(encoded["key"], "power");
        assert_eq!(encoded["value"], "on");
        assert_eq!(encoded["version"], 1);
        assert!(encoded["updated_at"].is_string());
    }
}
