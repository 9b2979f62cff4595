//! Error types for the relay server

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur while running the HTTP server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("Server shutdown failed: {0}")]
    Shutdown(String),

    #[error("Invalid server configuration: {0}")]
    Configuration(String),
}
