//! Configuration types for the broker bridge
//!
//! This module defines the settings that control the bridge's broker
//! connection: endpoint, credentials, TLS material, the fixed subscription
//! set and the reconnect policy.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rumqttc::{MqttOptions, QoS, TlsConfiguration, Transport};

use crate::backoff::ReconnectConfig;
use crate::error::BridgeError;
use crate::topic;

/// Username/password pair for the broker
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Files holding TLS trust material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM encoded CA certificate(s) used to verify the broker
    pub ca_file: PathBuf,

    /// Optional PEM client certificate for mutual TLS
    pub client_cert_file: Option<PathBuf>,

    /// Optional PEM client key for mutual TLS
    pub client_key_file: Option<PathBuf>,
}

/// Configuration for the BrokerBridge
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker host name or address
    /// Default: "localhost"
    pub host: String,

    /// Broker port
    /// Default: 1883
    pub port: u16,

    /// MQTT client identifier
    /// Default: "relay-<random uuid>"
    pub client_id: String,

    /// Optional username/password
    pub credentials: Option<Credentials>,

    /// Optional TLS settings; plain TCP when absent
    pub tls: Option<TlsConfig>,

    /// MQTT keep-alive interval
    /// Default: 30 seconds
    pub keep_alive: Duration,

    /// Topic filters subscribed on every (re)connect
    /// Default: empty
    pub subscriptions: Vec<String>,

    /// QoS used for subscriptions and publishes
    /// Default: AtMostOnce
    pub qos: QoS,

    /// Capacity of the MQTT client's request queue
    /// Default: 64
    pub request_capacity: usize,

    /// Reconnect backoff policy
    pub reconnect: ReconnectConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: format!("relay-{}", uuid::Uuid::new_v4()),
            credentials: None,
            tls: None,
            keep_alive: Duration::from_secs(30),
            subscriptions: Vec::new(),
            qos: QoS::AtMostOnce,
            request_capacity: 64,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Create a new BrokerConfig for the given endpoint with default values
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.host.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "Broker host must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(BridgeError::Configuration(
                "Broker port must be greater than 0".to_string(),
            ));
        }

        if self.client_id.is_empty() {
            return Err(BridgeError::Configuration(
                "Client id must not be empty".to_string(),
            ));
        }

        if self.keep_alive < Duration::from_secs(5) {
            return Err(BridgeError::Configuration(
                "Keep-alive must be at least 5 seconds".to_string(),
            ));
        }

        if self.request_capacity == 0 {
            return Err(BridgeError::Configuration(
                "Request capacity must be greater than 0".to_string(),
            ));
        }

        if let Some(invalid) = self
            .subscriptions
            .iter()
            .find(|filter| !topic::is_valid_filter(filter))
        {
            return Err(BridgeError::Configuration(format!(
                "Invalid subscription filter: '{invalid}'"
            )));
        }

        if let Some(tls) = &self.tls {
            if tls.client_cert_file.is_some() != tls.client_key_file.is_some() {
                return Err(BridgeError::Configuration(
                    "Client certificate and key must be provided together".to_string(),
                ));
            }
        }

        self.reconnect.validate()
    }

    // Builder pattern methods for fluent configuration

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_subscriptions<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscriptions = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Build the rumqttc options, loading TLS material from disk
    pub(crate) fn mqtt_options(&self) -> Result<MqttOptions, BridgeError> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        // Subscriptions are reissued on every ConnAck, so never rely on a persistent session
        options.set_clean_session(true);

        if let Some(credentials) = &self.credentials {
            options.set_credentials(&credentials.username, &credentials.password);
        }

        if let Some(tls) = &self.tls {
            let ca = read_pem(&tls.ca_file)?;
            let client_auth = match (&tls.client_cert_file, &tls.client_key_file) {
                (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
                _ => None,
            };

            options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth,
            }));
        }

        Ok(options)
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, BridgeError> {
    std::fs::read(path).map_err(|source| BridgeError::Tls {
        path: path.to_path_buf(),
        source,
    })
}
