use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use super::{ClientState, ConnectionManager, ConnectionState, RealtimeClient};
use crate::dispatch::ListenerRegistry;
use crate::types::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_INTERVAL,
};

/// Configuration for [`RealtimeClient`]. All knobs have defaults; intervals
/// are milliseconds.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Backoff unit: the delay before reconnect attempt `n` is `n` times this
    pub reconnect_interval: u64,
    /// Reconnection attempt budget before the client settles in `Failed`
    pub max_reconnect_attempts: u32,
    /// Interval between outbound heartbeat pings
    pub heartbeat_interval: u64,
    /// Outbound queue cap; the oldest entry is evicted beyond it
    pub max_queue_size: usize,
    /// Bound on the transport open call
    pub connect_timeout: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Builder that wires client state and spawns the reconnect supervisor.
pub struct RealtimeClientBuilder {
    endpoint: String,
    options: ClientOptions,
}

impl RealtimeClientBuilder {
    pub fn new(endpoint: impl Into<String>, options: ClientOptions) -> Self {
        Self {
            endpoint: endpoint.into(),
            options,
        }
    }

    /// Build the client and spawn the supervisor task. Must run inside a
    /// tokio runtime.
    ///
    /// The supervisor watches lifecycle transitions: on an abnormal closure
    /// it tears down the dead connection's tasks and drives the budgeted
    /// reconnect cycle; on a clean server close it only cleans up. Manual
    /// disconnects are left alone.
    pub fn build(self) -> RealtimeClient {
        let mut client_state = ClientState::new(self.options.max_queue_size);

        let (state_tx, state_rx) = watch::channel((ConnectionState::Disconnected, false));
        client_state.state_change_tx = Some(state_tx);

        let client = RealtimeClient {
            endpoint: self.endpoint,
            options: self.options,
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(client_state)),
            registry: ListenerRegistry::new(),
        };

        let supervisor = client.clone();
        tokio::spawn(async move {
            let mut rx = state_rx;
            while rx.changed().await.is_ok() {
                let (state, manual) = *rx.borrow_and_update();
                match state {
                    ConnectionState::Reconnecting if !manual => {
                        supervisor.teardown_connection().await;
                        supervisor.run_reconnect_cycle().await;
                    }
                    ConnectionState::Disconnected if !manual => {
                        supervisor.teardown_connection().await;
                    }
                    _ => {}
                }
            }
            tracing::debug!("Reconnect supervisor finished");
        });

        client
    }
}
