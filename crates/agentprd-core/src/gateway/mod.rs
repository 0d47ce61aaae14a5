//! HTTP gateway serving the agent.
//!
//! `POST /chat` runs one turn. With `Content-Type: application/json` the
//! reply is the multiplexed stream; with any other content type the turn
//! runs to completion and a single JSON object comes back.

mod routes;

pub use routes::{MAX_BODY_BYTES, routes};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::agent::Agent;
use crate::config::{Config, StoreBackend};
use crate::kv::{KvStore, MemoryKvStore, SqliteKvStore};

/// Open the key-value backend selected in the config.
pub fn open_store(config: &Config) -> Result<Arc<dyn KvStore>> {
    match config.gateway.store {
        StoreBackend::Memory => {
            info!("Using in-memory store; sessions will not survive a restart");
            Ok(Arc::new(MemoryKvStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = config.db_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let store = SqliteKvStore::open(&path)
                .with_context(|| format!("opening store at {}", path.display()))?;
            info!(path = %path.display(), "Opened SQLite store");
            Ok(Arc::new(store))
        }
    }
}

/// Bind the gateway and return the bound address with the server future.
/// The server stops when `shutdown` resolves.
pub fn bind(
    addr: SocketAddr,
    agent: Arc<Agent>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>)> {
    let (bound, server) = warp::serve(routes(agent))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .with_context(|| format!("binding gateway to {addr}"))?;
    Ok((bound, server))
}

/// Serve until `shutdown` resolves.
pub async fn run_gateway(
    addr: SocketAddr,
    agent: Arc<Agent>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let (bound, server) = bind(addr, agent, shutdown)?;
    info!(addr = %bound, "Gateway listening");
    info!("Chat endpoint available at http://{bound}/chat");
    server.await;
    info!("Gateway stopped");
    Ok(())
}
