use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{ClientOptions, ClientState, ConnectionManager, ConnectionState, RealtimeClientBuilder};
use crate::dispatch::{ListenerHandle, ListenerRegistry, MessageRouter};
use crate::heartbeat::HeartbeatMonitor;
use crate::infrastructure::Backoff;
use crate::types::{
    lifecycle_events, now_millis, Envelope, RealtimeError, Result, WS_CLOSE_NORMAL,
};

/// Snapshot of the manager's observable state, for dashboards and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub connection_state: ConnectionState,
    pub reconnect_attempts: u32,
    pub queue_size: usize,
    pub listeners_count: usize,
    pub is_connected: bool,
    pub last_heartbeat: Option<u64>,
}

/// Realtime connection manager: one persistent channel to one endpoint.
///
/// The client keeps a WebSocket open to the dashboard server, reconnects
/// with linear backoff after abnormal closures (up to a configured budget),
/// buffers outbound envelopes while disconnected, answers heartbeat probes,
/// and routes inbound envelopes to topic listeners.
///
/// Everything a collaborator needs to observe arrives through events
/// registered with [`on`](Self::on): the lifecycle topics `connected`,
/// `disconnected`, `failed`, `error` and `stateChange`, plus any application
/// topic the server publishes.
///
/// # Example
///
/// ```no_run
/// use agent_realtime::{ClientOptions, RealtimeClient};
///
/// # async fn example() {
/// let client = RealtimeClient::new("ws://localhost:8000/ws", ClientOptions::default());
///
/// client.on("stateChange", |payload| {
///     println!("connection is now {}", payload["state"]);
/// });
/// client.on("metric", |payload| {
///     println!("metric: {}", payload);
/// });
///
/// client.connect().await.expect("valid endpoint");
/// let delivered = client.send("metric", serde_json::json!({ "v": 1 })).await;
/// assert!(delivered || client.queue_size().await > 0);
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) endpoint: String,
    pub(crate) options: ClientOptions,
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) state: Arc<RwLock<ClientState>>,
    pub(crate) registry: Arc<ListenerRegistry>,
}

impl RealtimeClient {
    /// Create a client for the given endpoint. Does not connect; the
    /// endpoint URL is validated by [`connect()`](Self::connect). Must be
    /// called inside a tokio runtime (the reconnect supervisor is spawned
    /// here).
    pub fn new(endpoint: impl Into<String>, options: ClientOptions) -> Self {
        RealtimeClientBuilder::new(endpoint, options).build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Establish the channel. Idempotent: while an attempt is already in
    /// flight the call waits for that attempt instead of opening a second
    /// socket; while connected it returns immediately.
    ///
    /// The only error returned here is a malformed endpoint, rejected
    /// before any state transition. A transport open failure enters the
    /// reconnect path and surfaces as an `error` event followed by
    /// `stateChange` transitions.
    pub async fn connect(&self) -> Result<()> {
        if let Err(e) = Url::parse(&self.endpoint) {
            tracing::error!("Invalid endpoint: {}", e);
            return Err(e.into());
        }
        {
            let mut st = self.state.write().await;
            match self.connection.state().await {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    drop(st);
                    self.wait_until_settled().await;
                    return Ok(());
                }
                ConnectionState::Disconnected | ConnectionState::Failed => {}
            }
            st.reconnect_attempts = 0;
            st.was_manual_disconnect = false;
            self.connection.set_state(ConnectionState::Connecting).await;
            st.notify_state_change(ConnectionState::Connecting, false);
        }
        self.emit_state_change(ConnectionState::Connecting);
        tracing::info!("Connecting to {}", self.endpoint);

        if let Err(e) = self.open_connection().await {
            tracing::warn!("Connection attempt failed: {}", e);
            self.emit_error(&e);
            {
                let mut st = self.state.write().await;
                st.reconnect_attempts += 1;
            }
            self.set_state(ConnectionState::Reconnecting).await;
        }
        Ok(())
    }

    /// Tear the channel down and stay down. Cancels the heartbeat, the
    /// reader/writer tasks and any pending reconnect cycle; the outbound
    /// queue and the listener registry survive. No-op when already
    /// disconnected.
    pub async fn disconnect(&self) {
        if self.connection.state().await == ConnectionState::Disconnected {
            return;
        }
        tracing::info!("Disconnecting from {}", self.endpoint);

        {
            let mut st = self.state.write().await;
            st.was_manual_disconnect = true;
            st.reconnect_attempts = 0;
            st.task_manager.abort_all();
        }
        self.connection.clear_writer().await;
        self.set_state(ConnectionState::Disconnected).await;
        self.registry.emit(
            lifecycle_events::DISCONNECTED,
            &serde_json::json!({
                "code": WS_CLOSE_NORMAL,
                "reason": "client disconnect",
                "timestamp": now_millis(),
            }),
        );
    }

    /// Transmit an envelope now, or queue it for the next connection.
    ///
    /// Returns `true` when the envelope was handed to the wire, `false` when
    /// it was queued. Never an error: sending while disconnected is part of
    /// the contract.
    pub async fn send(&self, topic: impl Into<String>, payload: serde_json::Value) -> bool {
        let envelope = Envelope::new(topic, payload);

        let mut st = self.state.write().await;
        if self.connection.is_connected().await {
            match self.connection.transmit(&envelope).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!("Transmit failed, queueing envelope instead: {}", e);
                }
            }
        }
        st.enqueue(envelope);
        false
    }

    /// Register a listener; returns its unsubscribe handle.
    pub fn on<F>(&self, topic: &str, callback: F) -> ListenerHandle
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.registry.on(topic, callback)
    }

    /// Register a listener that fires once, then removes itself.
    pub fn once<F>(&self, topic: &str, callback: F) -> ListenerHandle
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.registry.once(topic, callback)
    }

    /// Remove the listener behind a handle.
    pub fn off(&self, handle: &ListenerHandle) {
        handle.unsubscribe();
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub async fn queue_size(&self) -> usize {
        self.state.read().await.queue.len()
    }

    /// Drop all queued outbound envelopes.
    pub async fn clear_queue(&self) {
        let mut st = self.state.write().await;
        let dropped = st.queue.len();
        st.queue.clear();
        if dropped > 0 {
            tracing::debug!(count = dropped, "Cleared outbound queue");
        }
    }

    pub fn listeners_count(&self) -> usize {
        self.registry.len()
    }

    /// Receipt time of the latest peer pong, epoch milliseconds.
    pub async fn last_heartbeat(&self) -> Option<u64> {
        self.state.read().await.last_heartbeat
    }

    pub async fn stats(&self) -> Stats {
        let st = self.state.read().await;
        Stats {
            connection_state: self.connection.state().await,
            reconnect_attempts: st.reconnect_attempts,
            queue_size: st.queue.len(),
            listeners_count: self.registry.len(),
            is_connected: self.connection.is_connected().await,
            last_heartbeat: st.last_heartbeat,
        }
    }

    // --- lifecycle internals ---

    /// Transition, notify the supervisor, emit `stateChange`.
    async fn set_state(&self, new_state: ConnectionState) {
        self.connection.set_state(new_state).await;
        self.emit_state_change(new_state);
        let st = self.state.read().await;
        st.notify_state_change(new_state, st.was_manual_disconnect);
    }

    fn emit_state_change(&self, state: ConnectionState) {
        self.registry.emit(
            lifecycle_events::STATE_CHANGE,
            &serde_json::json!({ "state": state, "timestamp": now_millis() }),
        );
    }

    fn emit_error(&self, error: &RealtimeError) {
        self.registry.emit(
            lifecycle_events::ERROR,
            &serde_json::json!({ "message": error.to_string(), "timestamp": now_millis() }),
        );
    }

    /// Block until the state leaves `Connecting`/`Reconnecting`.
    async fn wait_until_settled(&self) {
        let mut rx = {
            let st = self.state.read().await;
            match &st.state_change_tx {
                Some(tx) => tx.subscribe(),
                None => return,
            }
        };
        loop {
            let (state, _) = *rx.borrow_and_update();
            match state {
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    if rx.changed().await.is_err() {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// Open a fresh socket, wire up the writer/reader/heartbeat tasks, flush
    /// the outbound queue and flip to `Connected`.
    ///
    /// The queue drain and the state flip happen under the client state
    /// lock, so no concurrent `send` can slip ahead of queued entries or
    /// enqueue behind a connection it cannot see yet.
    async fn open_connection(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)?;

        let open = connect_async(url.as_str());
        let (ws_stream, _response) =
            timeout(Duration::from_millis(self.options.connect_timeout), open)
                .await
                .map_err(|_| RealtimeError::ConnectTimeout)??;

        let (mut write_half, mut read_half) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<Message>(128);

        let write_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = write_half.send(message).await {
                    tracing::warn!("WebSocket write error: {}", e);
                    break;
                }
            }
            let _ = write_half.close().await;
            tracing::debug!("Write task finished");
        });

        self.connection.set_writer(tx).await;

        let mut st = self.state.write().await;
        if st.was_manual_disconnect {
            // disconnect() raced the open; tear the fresh socket down again
            write_task.abort();
            drop(st);
            self.connection.clear_writer().await;
            return Ok(());
        }

        st.task_manager.track(write_task);
        st.reconnect_attempts = 0;

        let queued = st.queue.len();
        while let Some(envelope) = st.queue.pop_front() {
            if let Err(e) = self.connection.transmit(&envelope).await {
                tracing::warn!("Failed to flush queued envelope: {}", e);
                st.queue.push_front(envelope);
                break;
            }
        }
        if queued > 0 {
            tracing::info!(count = queued, "Flushed outbound queue");
        }

        self.connection.set_state(ConnectionState::Connected).await;
        st.notify_state_change(ConnectionState::Connected, false);

        let router = MessageRouter::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.connection),
            Arc::clone(&self.state),
        );
        let reader = self.clone();
        let read_task = tokio::spawn(async move {
            loop {
                match read_half.next().await {
                    Some(Ok(Message::Text(text))) => router.route_text(&text).await,
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), Some(f.reason.to_string())),
                            None => (None, None),
                        };
                        reader.handle_closure(code, reason).await;
                        break;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // transport-level keepalive, handled by tungstenite
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::warn!("Ignoring unexpected binary message ({} bytes)", data.len());
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        reader.handle_closure(None, None).await;
                        break;
                    }
                    None => {
                        reader.handle_closure(None, None).await;
                        break;
                    }
                }
            }
            tracing::debug!("Read task finished");
        });

        let heartbeat_task = HeartbeatMonitor::new(Arc::downgrade(&self.connection))
            .with_interval(Duration::from_millis(self.options.heartbeat_interval))
            .spawn();

        st.task_manager.track(read_task);
        st.task_manager.track(heartbeat_task);
        drop(st);

        self.emit_state_change(ConnectionState::Connected);
        self.registry.emit(
            lifecycle_events::CONNECTED,
            &serde_json::json!({ "timestamp": now_millis() }),
        );
        tracing::info!("Connected to {}", self.endpoint);
        Ok(())
    }

    /// React to the socket closing underneath us. A close code of 1000 is a
    /// clean shutdown; anything else (or no code at all) schedules
    /// reconnection.
    pub(crate) async fn handle_closure(&self, code: Option<u16>, reason: Option<String>) {
        {
            let st = self.state.read().await;
            if st.was_manual_disconnect {
                return;
            }
        }
        if self.connection.state().await != ConnectionState::Connected {
            return;
        }

        self.connection.clear_writer().await;
        self.registry.emit(
            lifecycle_events::DISCONNECTED,
            &serde_json::json!({
                "code": code,
                "reason": reason,
                "timestamp": now_millis(),
            }),
        );

        if code == Some(WS_CLOSE_NORMAL) {
            tracing::info!("Server closed the connection normally");
            self.set_state(ConnectionState::Disconnected).await;
        } else {
            tracing::warn!(?code, "Abnormal closure, scheduling reconnection");
            {
                let mut st = self.state.write().await;
                st.reconnect_attempts += 1;
            }
            self.set_state(ConnectionState::Reconnecting).await;
        }
    }

    /// Abort the dead connection's tasks and drop its writer. The queue and
    /// the registry are left intact.
    pub(crate) async fn teardown_connection(&self) {
        {
            let mut st = self.state.write().await;
            st.task_manager.abort_all();
        }
        self.connection.clear_writer().await;
    }

    /// Drive budgeted reconnection: delay `reconnect_interval × attempt`,
    /// retry, and settle in `Failed` once the budget is spent. Runs on the
    /// supervisor task; a manual disconnect or an explicit `connect()`
    /// elsewhere makes it bail out.
    pub(crate) async fn run_reconnect_cycle(&self) {
        let backoff = Backoff::new(Duration::from_millis(self.options.reconnect_interval));
        let max_attempts = self.options.max_reconnect_attempts;

        loop {
            if self.state.read().await.was_manual_disconnect {
                return;
            }
            if self.connection.state().await != ConnectionState::Reconnecting {
                return;
            }

            let attempt = self.state.read().await.reconnect_attempts;
            if attempt > max_attempts {
                self.enter_failed().await;
                return;
            }

            tracing::info!(
                attempt,
                max_attempts,
                "Waiting before reconnection attempt"
            );
            backoff.wait(attempt).await;

            if self.state.read().await.was_manual_disconnect {
                return;
            }
            if self.connection.state().await != ConnectionState::Reconnecting {
                return;
            }

            self.set_state(ConnectionState::Connecting).await;
            match self.open_connection().await {
                Ok(()) => {
                    tracing::info!("Reconnected successfully");
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, "Reconnection attempt failed: {}", e);
                    self.emit_error(&e);
                    {
                        let mut st = self.state.write().await;
                        if st.was_manual_disconnect {
                            return;
                        }
                        st.reconnect_attempts += 1;
                    }
                    self.set_state(ConnectionState::Reconnecting).await;
                }
            }
        }
    }

    /// Budget spent: stop retrying until an explicit `connect()`.
    async fn enter_failed(&self) {
        let max_attempts = self.options.max_reconnect_attempts;
        {
            let mut st = self.state.write().await;
            st.reconnect_attempts = max_attempts;
        }
        tracing::error!(
            attempts = max_attempts,
            "Reconnect budget exhausted, giving up"
        );
        self.set_state(ConnectionState::Failed).await;
        self.registry.emit(
            lifecycle_events::FAILED,
            &serde_json::json!({ "attempts": max_attempts, "timestamp": now_millis() }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn client() -> RealtimeClient {
        RealtimeClient::new("ws://127.0.0.1:9", ClientOptions::default())
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let client = client();
        assert_eq!(
            client.connection_state().await,
            ConnectionState::Disconnected
        );
        assert!(!client.is_connected().await);
        assert_eq!(client.queue_size().await, 0);
        assert_eq!(client.listeners_count(), 0);
    }

    #[tokio::test]
    async fn send_while_disconnected_queues() {
        let client = client();
        let delivered = client.send("metric", serde_json::json!({ "v": 1 })).await;
        assert!(!delivered);
        assert_eq!(client.queue_size().await, 1);

        client.clear_queue().await;
        assert_eq!(client.queue_size().await, 0);
    }

    #[tokio::test]
    async fn connect_with_malformed_endpoint_errors() {
        let client = RealtimeClient::new("not a url", ClientOptions::default());
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&transitions);
        let _handle = client.on("stateChange", move |payload| {
            seen.lock().unwrap().push(payload["state"].clone());
        });

        let result = client.connect().await;
        assert!(matches!(result, Err(RealtimeError::UrlParse(_))));
        assert_eq!(
            client.connection_state().await,
            ConnectionState::Disconnected
        );
        // rejected before any transition, so no stateChange fires
        assert!(transitions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disconnect_when_already_disconnected_is_noop() {
        let client = client();
        client.disconnect().await;
        assert_eq!(
            client.connection_state().await,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn listener_handles_round_trip_through_client() {
        let client = client();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let slot = Arc::clone(&seen);
        let handle = client.on("status", move |payload| {
            slot.lock().unwrap().push(payload.clone());
        });
        assert_eq!(client.listeners_count(), 1);

        client
            .registry
            .emit("status", &serde_json::json!({ "ok": true }));
        assert_eq!(seen.lock().unwrap().len(), 1);

        client.off(&handle);
        assert_eq!(client.listeners_count(), 0);
    }

    #[tokio::test]
    async fn stats_reflect_queue_and_listeners() {
        let client = client();
        client.send("a", serde_json::Value::Null).await;
        client.send("b", serde_json::Value::Null).await;
        let _handle = client.on("a", |_| {});

        let stats = client.stats().await;
        assert_eq!(stats.queue_size, 2);
        assert_eq!(stats.listeners_count, 1);
        assert_eq!(stats.reconnect_attempts, 0);
        assert!(!stats.is_connected);
        assert!(stats.last_heartbeat.is_none());
        assert_eq!(stats.connection_state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn stats_serialize_for_dashboards() {
        let client = client();
        let stats = client.stats().await;
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["connection_state"], "disconnected");
        assert_eq!(json["is_connected"], false);
    }
}
