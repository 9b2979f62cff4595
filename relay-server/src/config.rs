//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

use relay_hub::StateKey;

use crate::error::ServerError;

/// Smallest usable client buffer: a joining client receives one record per
/// tracked key before anything else
pub const MIN_CLIENT_BUFFER_SIZE: usize = StateKey::ALL.len();

/// Origin allowed by default, the local web client dev server
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Configuration for the HTTP and WebSocket server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    ///
    /// Default: 0.0.0.0:8000
    pub bind_addr: SocketAddr,

    /// Outbound buffer per WebSocket client, in messages
    ///
    /// A client that falls this far behind is disconnected. Must hold at
    /// least the join snapshot ([`MIN_CLIENT_BUFFER_SIZE`]).
    ///
    /// Default: 64
    pub client_buffer_size: usize,

    /// Origins allowed by CORS; `*` allows any origin
    ///
    /// Default: ["http://localhost:3000"]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8000)),
            client_buffer_size: 64,
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.client_buffer_size < MIN_CLIENT_BUFFER_SIZE {
            return Err(ServerError::Configuration(format!(
                "client_buffer_size must be at least {MIN_CLIENT_BUFFER_SIZE} to hold the state snapshot, got {}",
                self.client_buffer_size
            )));
        }

        for origin in &self.allowed_origins {
            if !is_valid_origin(origin) {
                return Err(ServerError::Configuration(format!(
                    "invalid CORS origin '{origin}', expected scheme://host[:port]"
                )));
            }
        }

        Ok(())
    }

    pub fn with_client_buffer_size(mut self, size: usize) -> Self {
        self.client_buffer_size = size;
        self
    }

    pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Whether CORS should accept any origin
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

fn is_valid_origin(origin: &str) -> bool {
    if origin == "*" {
        return true;
    }

    let Some((scheme, authority)) = origin.split_once("://") else {
        return false;
    };

    matches!(scheme, "http" | "https")
        && !authority.is_empty()
        && !authority.contains(['/', '?', '#', ' '])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn test_buffer_smaller_than_snapshot_is_rejected() {
        for size in 0..MIN_CLIENT_BUFFER_SIZE {
            let config = ServerConfig::default().with_client_buffer_size(size);
            assert!(
                matches!(config.validate(), Err(ServerError::Configuration(_))),
                "buffer of {size} should be rejected"
            );
        }

        let config = ServerConfig::default().with_client_buffer_size(MIN_CLIENT_BUFFER_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_origin_validation() {
        let valid = ServerConfig::default().with_allowed_origins([
            "https://app.example.com",
            "http://192.168.1.20:3001",
            "*",
        ]);
        assert!(valid.validate().is_ok());
        assert!(valid.allows_any_origin());

        for origin in ["localhost:3000", "ftp://example.com", "http://", "http://host/path"] {
            let config = ServerConfig::default().with_allowed_origins([origin]);
            assert!(config.validate().is_err(), "{origin} should be rejected");
        }
    }
}
