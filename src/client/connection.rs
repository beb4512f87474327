use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::types::{Envelope, RealtimeError, Result};

/// Lifecycle state of the managed channel. Exactly one is active at a time
/// and the lifecycle controller owns every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket and no pending attempt
    Disconnected,
    /// Transport open in flight
    Connecting,
    /// Channel open and healthy
    Connected,
    /// Abnormal closure observed, retry scheduled
    Reconnecting,
    /// Reconnect budget exhausted; only an explicit `connect()` restarts
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Owns the write side of the socket and the current lifecycle state.
///
/// The writer is an `mpsc` sender feeding the connection's write task; the
/// socket itself is created fresh on every attempt and never reused. All
/// outbound traffic funnels through [`transmit`](Self::transmit), which
/// keeps wire order identical to call order.
pub struct ConnectionManager {
    writer: RwLock<Option<mpsc::Sender<Message>>>,
    state: RwLock<ConnectionState>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            writer: RwLock::new(None),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state;
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    /// Install the writer channel for a freshly opened socket.
    pub async fn set_writer(&self, writer: mpsc::Sender<Message>) {
        *self.writer.write().await = Some(writer);
    }

    /// Drop the writer; the write task drains pending frames, closes the
    /// sink and exits.
    pub async fn clear_writer(&self) {
        *self.writer.write().await = None;
    }

    /// Serialize an envelope and hand it to the write task.
    pub async fn transmit(&self, envelope: &Envelope) -> Result<()> {
        let json = serde_json::to_string(envelope)?;
        let message = Message::Text(json.into());

        let writer = self.writer.read().await;
        let Some(tx) = writer.as_ref() else {
            return Err(RealtimeError::Connection("no active writer".to_string()));
        };

        tx.send(message)
            .await
            .map_err(|_| RealtimeError::Connection("write task stopped".to_string()))
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
