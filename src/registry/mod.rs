//! Connection registry.
//!
//! Thread-safe directory from an entity id (rider or driver) to its single
//! live connection. Lookups take a shared read lock so concurrent fan-out
//! sends proceed in parallel; add/remove take the write lock only for the
//! map mutation. Writes to one connection are serialized by the connection
//! itself; sends to different connections do not contend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::messaging::WsMessage;

pub mod mock;

pub use mock::MockConnection;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no live connection for {0}")]
    NotFound(String),

    #[error("failed to encode outbound message: {0}")]
    Encode(String),

    #[error("connection write failed: {0}")]
    Send(String),
}

/// One live bidirectional connection.
///
/// Implementations must serialize their own writes: a connection never has
/// two concurrent writers.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn send(&self, message: &WsMessage) -> Result<()>;
}

/// Directory of live connections keyed by entity id.
///
/// At most one entry per entity id: a second registration for the same id
/// overwrites the first. The orphaned handle is closed by its own read loop
/// failing.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<dyn Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the connection for `entity_id`.
    pub async fn add(&self, entity_id: &str, connection: Arc<dyn Connection>) {
        self.connections
            .write()
            .await
            .insert(entity_id.to_string(), connection);
        info!(entity_id, "Connection added");
    }

    /// Remove the connection for `entity_id`, if present.
    pub async fn remove(&self, entity_id: &str) {
        self.connections.write().await.remove(entity_id);
        info!(entity_id, "Connection removed");
    }

    /// Look up the connection for `entity_id`.
    pub async fn get(&self, entity_id: &str) -> Option<Arc<dyn Connection>> {
        self.connections.read().await.get(entity_id).cloned()
    }

    /// Serialize `message` onto the connection registered for `entity_id`.
    ///
    /// The entry is cloned out of the read lock before writing, so a slow
    /// recipient never blocks lookups or sends to other entities.
    pub async fn send(&self, entity_id: &str, message: &WsMessage) -> Result<()> {
        let connection = self
            .get(entity_id)
            .await
            .ok_or_else(|| RegistryError::NotFound(entity_id.to_string()))?;
        connection.send(message).await
    }
}

/// WebSocket-backed connection handle for the registry.
pub struct WsConnection {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsConnection {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&self, message: &WsMessage) -> Result<()> {
        let text =
            serde_json::to_string(message).map_err(|e| RegistryError::Encode(e.to_string()))?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| RegistryError::Send(e.to_string()))
    }
}

#[cfg(test)]
mod tests;
