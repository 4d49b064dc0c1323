//! WebSocket JSON-RPC server bootstrap.
//!
//! Serves [`crate::rpc::MemoriaeRpc`] at `/rpc/v0` (spec §6). The HMAC token
//! gate in [`crate::auth`] is a fully independent, tested primitive; wiring
//! it into the transport is left to the embedder (e.g. a reverse proxy or a
//! custom `tower` layer in front of this server) rather than bolted on here,
//! since the core engine's methods are reachable unconditionally when no
//! gate is configured (spec §6: "When disabled, all methods are reachable").

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::ServerBuilder;

use crate::dispatch::Node;
use crate::rpc::{MemoriaeApiServer, MemoriaeRpc};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Starts serving `node` at `addr` and runs until the returned handle is
/// stopped or dropped.
pub async fn serve(node: Arc<Node>, addr: SocketAddr) -> Result<jsonrpsee::server::ServerHandle, ServeError> {
    let server = ServerBuilder::default()
        .build(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source: std::io::Error::new(std::io::ErrorKind::AddrInUse, source) })?;

    let rpc = MemoriaeRpc { node };
    let handle = server.start(rpc.into_rpc());
    log::info!("listening on {} (namespace Memoriae, path /rpc/v0)", addr);
    Ok(handle)
}
