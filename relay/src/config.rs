//! Command line and environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use broker_bridge::{BrokerConfig, TlsConfig};
use clap::{Parser, ValueEnum};
use relay_hub::{HubConfig, TopicTable};
use relay_server::ServerConfig;
use tracing::info;

use crate::logging::{self, LoggingMode};

/// MQTT to WebSocket relay
///
/// Subscribes to LED and navigation topics on an MQTT broker, keeps the
/// latest value of each, and relays updates to WebSocket clients.
#[derive(Parser, Debug, Clone)]
#[command(name = "relay")]
#[command(about = "MQTT to WebSocket relay with shared latest-value state")]
#[command(version)]
pub struct Args {
    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    pub broker_host: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883")]
    pub broker_port: u16,

    /// MQTT client id (random if omitted)
    #[arg(long)]
    pub client_id: Option<String>,

    /// MQTT username
    #[arg(long)]
    pub broker_username: Option<String>,

    /// MQTT password
    #[arg(long)]
    pub broker_password: Option<String>,

    /// CA certificate (PEM) enabling TLS to the broker
    #[arg(long)]
    pub broker_ca_file: Option<PathBuf>,

    /// Client certificate (PEM) for mutual TLS
    #[arg(long)]
    pub broker_client_cert: Option<PathBuf>,

    /// Client private key (PEM) for mutual TLS
    #[arg(long)]
    pub broker_client_key: Option<PathBuf>,

    /// MQTT keep-alive in seconds
    #[arg(long, default_value = "30")]
    pub keep_alive: u64,

    /// Broker topic that client `publish` messages are sent to
    #[arg(long, default_value = "relay/outbound")]
    pub outbound_topic: String,

    /// HTTP and WebSocket listen address
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Outbound buffer per WebSocket client
    #[arg(long, default_value = "64")]
    pub client_buffer: usize,

    /// Capacity of the hub event queue
    #[arg(long, default_value = "1024")]
    pub queue_capacity: usize,

    /// Allowed CORS origins, comma separated (`*` for any)
    #[arg(long, value_delimiter = ',', default_value = "http://localhost:3000")]
    pub allowed_origins: Vec<String>,

    /// Log level or filter directives (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LoggingMode::Compact)]
    pub log_format: LoggingMode,
}

impl Args {
    /// Apply `RELAY_*` overrides, reading variables through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("RELAY_BROKER_HOST") {
            self.broker_host = host;
        }

        if let Some(port) = lookup("RELAY_BROKER_PORT") {
            self.broker_port = port
                .parse()
                .context("Invalid RELAY_BROKER_PORT environment variable")?;
        }

        if let Some(client_id) = lookup("RELAY_BROKER_CLIENT_ID") {
            self.client_id = Some(client_id);
        }

        if let Some(username) = lookup("RELAY_BROKER_USERNAME") {
            self.broker_username = Some(username);
        }

        if let Some(password) = lookup("RELAY_BROKER_PASSWORD") {
            self.broker_password = Some(password);
        }

        if let Some(path) = lookup("RELAY_BROKER_CA_FILE") {
            self.broker_ca_file = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("RELAY_BROKER_CLIENT_CERT") {
            self.broker_client_cert = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("RELAY_BROKER_CLIENT_KEY") {
            self.broker_client_key = Some(PathBuf::from(path));
        }

        if let Some(keep_alive) = lookup("RELAY_KEEP_ALIVE") {
            self.keep_alive = keep_alive
                .parse()
                .context("Invalid RELAY_KEEP_ALIVE environment variable")?;
        }

        if let Some(topic) = lookup("RELAY_OUTBOUND_TOPIC") {
            self.outbound_topic = topic;
        }

        if let Some(bind) = lookup("RELAY_BIND") {
            self.bind = bind
                .parse()
                .context("Invalid RELAY_BIND environment variable")?;
        }

        if let Some(size) = lookup("RELAY_CLIENT_BUFFER") {
            self.client_buffer = size
                .parse()
                .context("Invalid RELAY_CLIENT_BUFFER environment variable")?;
        }

        if let Some(capacity) = lookup("RELAY_QUEUE_CAPACITY") {
            self.queue_capacity = capacity
                .parse()
                .context("Invalid RELAY_QUEUE_CAPACITY environment variable")?;
        }

        if let Some(origins) = lookup("RELAY_ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(level) = lookup("RELAY_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Some(format) = lookup("RELAY_LOG_FORMAT") {
            self.log_format = LoggingMode::from_str(&format, true)
                .map_err(|e| anyhow::anyhow!("Invalid RELAY_LOG_FORMAT environment variable: {e}"))?;
        }

        Ok(())
    }

    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.broker_host.trim().is_empty() {
            return Err(anyhow::anyhow!("Broker host must not be empty"));
        }

        if self.broker_port == 0 {
            return Err(anyhow::anyhow!("Broker port must not be 0"));
        }

        if self.broker_password.is_some() && self.broker_username.is_none() {
            return Err(anyhow::anyhow!("A broker password requires a username"));
        }

        if self.broker_ca_file.is_none()
            && (self.broker_client_cert.is_some() || self.broker_client_key.is_some())
        {
            return Err(anyhow::anyhow!(
                "Client certificates require --broker-ca-file to enable TLS"
            ));
        }

        if self.allowed_origins.is_empty() {
            return Err(anyhow::anyhow!("At least one allowed origin is required"));
        }

        logging::parse_filter(&self.log_level)?;

        Ok(())
    }
}

/// Configuration derived from command line arguments and environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerConfig,
    pub server: ServerConfig,
    pub hub: HubConfig,
    pub topics: TopicTable,
    pub log_level: String,
    pub log_format: LoggingMode,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let topics = TopicTable::default();

        let mut broker = BrokerConfig::new(args.broker_host, args.broker_port)
            .with_subscriptions(topics.filters());
        broker.keep_alive = Duration::from_secs(args.keep_alive);
        if let Some(client_id) = args.client_id {
            broker = broker.with_client_id(client_id);
        }
        if let Some(username) = args.broker_username {
            broker = broker.with_credentials(username, args.broker_password.unwrap_or_default());
        }
        if let Some(ca_file) = args.broker_ca_file {
            broker = broker.with_tls(TlsConfig {
                ca_file,
                client_cert_file: args.broker_client_cert,
                client_key_file: args.broker_client_key,
            });
        }

        let server = ServerConfig::new(args.bind)
            .with_client_buffer_size(args.client_buffer)
            .with_allowed_origins(args.allowed_origins);

        let hub = HubConfig::default()
            .with_queue_capacity(args.queue_capacity)
            .with_outbound_topic(args.outbound_topic);

        Self {
            broker,
            server,
            hub,
            topics,
            log_level: args.log_level,
            log_format: args.log_format,
        }
    }
}

impl Config {
    /// Create configuration from command line arguments and environment variables
    pub fn load() -> Result<Self> {
        let mut args = Args::parse();
        args.apply_env(|name| std::env::var(name).ok())?;
        Self::from_args(args)
    }

    /// Validate `args` and build the per-component configuration
    pub fn from_args(args: Args) -> Result<Self> {
        args.validate()?;

        let config = Config::from(args);
        config.validate()?;
        Ok(config)
    }

    /// Validate every component configuration
    pub fn validate(&self) -> Result<()> {
        self.broker
            .validate()
            .context("Invalid broker configuration")?;
        self.server
            .validate()
            .context("Invalid server configuration")?;
        self.hub
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid hub configuration: {e}"))?;
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        info!("Configuration:");
        info!("  Broker: {}:{}", self.broker.host, self.broker.port);
        info!("  Client id: {}", self.broker.client_id);
        info!(
            "  Credentials: {}",
            if self.broker.credentials.is_some() { "yes" } else { "no" }
        );
        info!("  TLS: {}", if self.broker.tls.is_some() { "yes" } else { "no" });
        info!("  Subscriptions: {}", self.broker.subscriptions.join(", "));
        info!("  Outbound topic: {}", self.hub.outbound_topic);
        info!("  Listen address: {}", self.server.bind_addr);
        info!("  Allowed origins: {}", self.server.allowed_origins.join(", "));
        info!("  Client buffer: {}", self.server.client_buffer_size);
        info!("  Hub queue capacity: {}", self.hub.queue_capacity);
        info!("  Log level: {}", self.log_level);
    }
}
