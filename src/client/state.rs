use std::collections::VecDeque;
use tokio::sync::watch;

use super::connection::ConnectionState;
use crate::infrastructure::TaskManager;
use crate::types::Envelope;

/// Consolidated mutable state for [`RealtimeClient`](super::RealtimeClient).
/// Lives behind a single lock so every mutation is atomic with respect to
/// other tasks; the queue and the reconnect accounting are never observable
/// half-updated.
pub struct ClientState {
    /// Envelopes accumulated while not connected, in enqueue order
    pub queue: VecDeque<Envelope>,

    /// Queue cap; the oldest entry is evicted beyond this
    pub max_queue_size: usize,

    /// Abnormal closures and failed retries since the last successful open
    pub reconnect_attempts: u32,

    /// Receipt time of the latest peer pong (epoch ms)
    pub last_heartbeat: Option<u64>,

    /// Set by `disconnect()`; suppresses automatic reconnection
    pub was_manual_disconnect: bool,

    /// Background tasks of the current connection attempt
    pub task_manager: TaskManager,

    /// Notifies the reconnect supervisor and `connect()` waiters
    pub state_change_tx: Option<watch::Sender<(ConnectionState, bool)>>,
}

impl ClientState {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max_queue_size,
            reconnect_attempts: 0,
            last_heartbeat: None,
            was_manual_disconnect: false,
            task_manager: TaskManager::new(),
            state_change_tx: None,
        }
    }

    /// Append an envelope, evicting the oldest entry when the cap is hit.
    pub fn enqueue(&mut self, envelope: Envelope) {
        if self.queue.len() >= self.max_queue_size {
            if let Some(evicted) = self.queue.pop_front() {
                tracing::warn!(
                    topic = %evicted.topic,
                    cap = self.max_queue_size,
                    "Outbound queue full, evicting oldest entry"
                );
            }
        }
        self.queue.push_back(envelope);
    }

    /// Notify state change watchers.
    pub fn notify_state_change(&self, state: ConnectionState, manual: bool) {
        if let Some(tx) = &self.state_change_tx {
            if tx.send((state, manual)).is_err() {
                tracing::debug!(%state, "State watcher gone, could not notify");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(tag: u64) -> Envelope {
        Envelope::new("metric", serde_json::json!({ "tag": tag }))
    }

    #[test]
    fn enqueue_preserves_fifo_order() {
        let mut state = ClientState::new(10);
        for tag in 0..4 {
            state.enqueue(envelope(tag));
        }

        let tags: Vec<u64> = state
            .queue
            .iter()
            .map(|e| e.data["tag"].as_u64().unwrap())
            .collect();
        assert_eq!(tags, vec![0, 1, 2, 3]);
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let mut state = ClientState::new(3);
        for tag in 0..5 {
            state.enqueue(envelope(tag));
        }

        assert_eq!(state.queue.len(), 3);
        let tags: Vec<u64> = state
            .queue
            .iter()
            .map(|e| e.data["tag"].as_u64().unwrap())
            .collect();
        assert_eq!(tags, vec![2, 3, 4]);
    }

    #[test]
    fn fresh_state_defaults() {
        let state = ClientState::new(100);
        assert!(state.queue.is_empty());
        assert_eq!(state.reconnect_attempts, 0);
        assert!(state.last_heartbeat.is_none());
        assert!(!state.was_manual_disconnect);
    }
}
