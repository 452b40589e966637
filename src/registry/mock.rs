//! Mock connection for testing fan-out and registry behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Connection, RegistryError, Result};
use crate::messaging::WsMessage;

/// Records every message sent to it instead of writing to a socket.
#[derive(Default)]
pub struct MockConnection {
    sent: Mutex<Vec<WsMessage>>,
    dead: AtomicBool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail like a closed socket.
    pub fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
    }

    /// Messages received so far, in order.
    pub fn sent(&self) -> Vec<WsMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&self, message: &WsMessage) -> Result<()> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(RegistryError::Send("connection closed".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
