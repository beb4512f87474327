use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::client::ConnectionManager;
use crate::types::{Envelope, DEFAULT_HEARTBEAT_INTERVAL};

/// Periodic liveness probe for the open channel.
///
/// While the connection is up, a `ping` envelope goes out every interval.
/// The monitor itself never force-closes a stale connection; it only keeps
/// probing, and the router records peer `pong` receipt times so collaborators
/// can build staleness policies on top. The task is tracked by the client's
/// `TaskManager` and aborted before every reconnect attempt, so timers never
/// leak across connections.
pub struct HeartbeatMonitor {
    interval: Duration,
    connection: Weak<ConnectionManager>,
}

impl HeartbeatMonitor {
    pub fn new(connection: Weak<ConnectionManager>) -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL),
            connection,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the probe task for the current connection.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            // interval fires immediately; the first probe waits a full period
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(connection) = self.connection.upgrade() else {
                    break;
                };
                if !connection.is_connected().await {
                    break;
                }

                match connection.transmit(&Envelope::ping()).await {
                    Ok(()) => tracing::debug!("Sent heartbeat ping"),
                    Err(e) => {
                        tracing::warn!("Failed to send heartbeat ping: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Heartbeat task finished");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectionState;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test(start_paused = true)]
    async fn probes_while_connected() {
        let connection = Arc::new(ConnectionManager::new());
        let (tx, mut rx) = mpsc::channel::<Message>(16);
        connection.set_writer(tx).await;
        connection.set_state(ConnectionState::Connected).await;

        let handle = HeartbeatMonitor::new(Arc::downgrade(&connection))
            .with_interval(Duration::from_millis(50))
            .spawn();

        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text frame");
        };
        let envelope: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(envelope.topic, "ping");

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_no_longer_connected() {
        let connection = Arc::new(ConnectionManager::new());
        let (tx, _rx) = mpsc::channel::<Message>(16);
        connection.set_writer(tx).await;
        connection.set_state(ConnectionState::Reconnecting).await;

        let handle = HeartbeatMonitor::new(Arc::downgrade(&connection))
            .with_interval(Duration::from_millis(10))
            .spawn();

        // first tick observes a non-connected state and the task exits
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("heartbeat task should finish")
            .unwrap();
    }
}
