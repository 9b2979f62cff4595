//! Tracked state keys and their value types
//!
//! The relay tracks three keys. Each has a default that seeds the store at
//! version 0, so a record exists for every key from startup onwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use state_store::{StateReader, StateRecord, StateStore};

use crate::error::DecodeError;

/// Default LED color before any update is received
pub const DEFAULT_COLOR: &str = "#ffffff";

/// Keys tracked by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKey {
    Color,
    Power,
    Nav,
}

impl StateKey {
    /// Every tracked key, in store order
    pub const ALL: [StateKey; 3] = [StateKey::Color, StateKey::Power, StateKey::Nav];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::Color => "color",
            StateKey::Power => "power",
            StateKey::Nav => "nav",
        }
    }

    /// Value a key holds before it is first written
    pub fn default_value(&self) -> StateValue {
        match self {
            StateKey::Color => StateValue::Color(DEFAULT_COLOR.to_string()),
            StateKey::Power => StateValue::Power(Power::Off),
            StateKey::Nav => StateValue::Nav(NavState::default()),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKey {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "color" => Ok(StateKey::Color),
            "power" => Ok(StateKey::Power),
            "nav" => Ok(StateKey::Nav),
            other => Err(DecodeError::UnknownKey(other.to_string())),
        }
    }
}

/// LED power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    On,
    Off,
}

/// Navigation pad direction
///
/// Serialized lowercase; parsed case-insensitively from both broker topics
/// and client JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Center,
}

impl FromStr for Direction {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "center" => Ok(Direction::Center),
            other => Err(DecodeError::InvalidValue {
                key: StateKey::Nav,
                reason: format!("unknown direction '{other}'"),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Last navigation input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavState {
    pub direction: Option<Direction>,
    #[serde(default)]
    pub pressed: bool,
}

/// Value of a tracked key
///
/// Serialized without a tag: colors are strings, power is `"on"`/`"off"`,
/// navigation is an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Color(String),
    Power(Power),
    Nav(NavState),
}

impl StateValue {
    /// The key this value belongs to
    pub fn key(&self) -> StateKey {
        match self {
            StateValue::Color(_) => StateKey::Color,
            StateValue::Power(_) => StateKey::Power,
            StateValue::Nav(_) => StateKey::Nav,
        }
    }
}

pub type RelayStore = StateStore<StateKey, StateValue>;
pub type RelayReader = StateReader<StateKey, StateValue>;
pub type RelayRecord = StateRecord<StateKey, StateValue>;

/// Build a store seeded with the default value of every tracked key
pub fn initial_store() -> RelayStore {
    StateStore::with_initial(StateKey::ALL.iter().map(|key| (*key, key.default_value())))
}
