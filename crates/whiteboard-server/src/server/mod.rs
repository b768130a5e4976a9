//! Server assembly.
//!
//! Owns the store and registry, binds the listener, and serves both protocol
//! surfaces from one router: the HTTP API and the WebSocket upgrade.

pub mod http;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::error::StoreResult;
use crate::registry::SessionRegistry;
use crate::store::ElementStore;

/// The whiteboard session server.
pub struct WhiteboardServer {
    registry: Arc<SessionRegistry>,
    config: Config,
}

impl WhiteboardServer {
    /// Open the store under the configured data directory and build the
    /// registry.
    pub fn new(config: Config) -> StoreResult<Self> {
        let store = Arc::new(ElementStore::open(&config.data_dir)?);
        let registry = Arc::new(SessionRegistry::new(store));
        Ok(Self { registry, config })
    }

    /// The session registry (shared with tests).
    #[must_use]
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Serve until CTRL+C.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind or the server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let router = http::create_router(Arc::clone(&self.registry));
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));

        tracing::info!(
            %addr,
            data_dir = %self.config.data_dir.display(),
            "whiteboard server listening"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("server shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("Failed to install CTRL+C handler");
    tracing::info!("Received shutdown signal");
}
