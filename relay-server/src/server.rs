//! HTTP server lifecycle

use std::net::SocketAddr;
use std::time::Duration;

use relay_hub::HubHandle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::routes::{routes, RelayContext};

/// How long `shutdown` waits for in-flight requests
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP and WebSocket server in front of the relay hub
///
/// # Example
///
/// ```no_run
/// use relay_hub::{initial_store, HubHandle};
/// use relay_server::{RelayServer, ServerConfig};
///
/// # async fn run() -> Result<(), relay_server::ServerError> {
/// let store = initial_store();
/// let (hub, _inbox) = HubHandle::channel(1024, store.reader());
///
/// let server = RelayServer::start(ServerConfig::default(), hub).await?;
/// println!("Listening at {}", server.base_url());
///
/// server.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct RelayServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl RelayServer {
    /// Bind and start serving
    ///
    /// Binding to port 0 picks a free port; see [`RelayServer::local_addr`].
    pub async fn start(config: ServerConfig, hub: HubHandle) -> Result<Self, ServerError> {
        config.validate()?;

        let ctx = RelayContext::new(hub, config.client_buffer_size);
        let routes = routes(ctx, &config);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (local_addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(config.bind_addr, async move {
                shutdown_rx.recv().await;
            })
            .map_err(|e| ServerError::Bind {
                addr: config.bind_addr,
                reason: e.to_string(),
            })?;

        let server_handle = tokio::spawn(server);
        tracing::info!("Relay server listening on {}", local_addr);

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// `http://<addr>` of the listening socket
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests
    ///
    /// Open WebSocket sessions are not waited on; they end when the hub
    /// drops their connections.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.server_handle.take() {
            match timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => tracing::info!("Relay server stopped"),
                Ok(Err(e)) => return Err(ServerError::Shutdown(e.to_string())),
                Err(_) => {
                    return Err(ServerError::Shutdown(format!(
                        "server did not stop within {SHUTDOWN_TIMEOUT:?}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer")
            .field("local_addr", &self.local_addr)
            .field("running", &self.server_handle.is_some())
            .finish()
    }
}
