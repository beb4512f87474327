use std::sync::Arc;
use tokio::sync::RwLock;

use crate::client::{ClientState, ConnectionManager};
use crate::dispatch::ListenerRegistry;
use crate::types::{now_millis, Envelope, TOPIC_PING, TOPIC_PONG};

/// Routes inbound wire text to listeners.
///
/// Reserved heartbeat topics are consumed here and never reach application
/// listeners: an inbound `ping` is answered with a `pong` immediately, an
/// inbound `pong` updates the liveness clock. Anything that does not parse
/// as an envelope is logged and dropped.
pub struct MessageRouter {
    registry: Arc<ListenerRegistry>,
    connection: Arc<ConnectionManager>,
    state: Arc<RwLock<ClientState>>,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ListenerRegistry>,
        connection: Arc<ConnectionManager>,
        state: Arc<RwLock<ClientState>>,
    ) -> Self {
        Self {
            registry,
            connection,
            state,
        }
    }

    /// Parse one inbound text frame and route it.
    pub async fn route_text(&self, text: &str) {
        match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => self.route(envelope).await,
            Err(e) => {
                tracing::warn!("Dropping unparseable inbound message: {} - Raw: {}", e, text);
            }
        }
    }

    /// Route a parsed envelope.
    pub async fn route(&self, envelope: Envelope) {
        match envelope.topic.as_str() {
            TOPIC_PING => {
                tracing::debug!("Received ping, answering with pong");
                if let Err(e) = self.connection.transmit(&Envelope::pong()).await {
                    tracing::warn!("Failed to answer ping: {}", e);
                }
            }
            TOPIC_PONG => {
                self.state.write().await.last_heartbeat = Some(now_millis());
                tracing::debug!("Received pong, liveness updated");
            }
            topic => {
                self.registry.emit(topic, &envelope.data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectionState;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    async fn connected_router() -> (
        MessageRouter,
        Arc<ListenerRegistry>,
        mpsc::Receiver<Message>,
        Arc<RwLock<ClientState>>,
    ) {
        let registry = ListenerRegistry::new();
        let connection = Arc::new(ConnectionManager::new());
        let state = Arc::new(RwLock::new(ClientState::new(100)));
        let (tx, rx) = mpsc::channel::<Message>(16);
        connection.set_writer(tx).await;
        connection.set_state(ConnectionState::Connected).await;

        let router = MessageRouter::new(
            Arc::clone(&registry),
            Arc::clone(&connection),
            Arc::clone(&state),
        );
        (router, registry, rx, state)
    }

    #[tokio::test]
    async fn ping_produces_exactly_one_pong() {
        let (router, _registry, mut rx, _state) = connected_router().await;

        router
            .route_text(r#"{"type":"ping","data":{},"timestamp":1}"#)
            .await;

        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text frame");
        };
        let pong: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(pong.topic, "pong");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pong_updates_liveness_and_never_dispatches() {
        let (router, registry, _rx, state) = connected_router().await;

        let fired = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&fired);
        registry.on("pong", move |_| {
            *flag.lock().unwrap() = true;
        });

        router
            .route_text(r#"{"type":"pong","data":{},"timestamp":1}"#)
            .await;

        assert!(state.read().await.last_heartbeat.is_some());
        assert!(!*fired.lock().unwrap());
    }

    #[tokio::test]
    async fn ping_never_reaches_application_listeners() {
        let (router, registry, mut rx, _state) = connected_router().await;

        let fired = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&fired);
        registry.on("ping", move |_| {
            *flag.lock().unwrap() = true;
        });

        router
            .route_text(r#"{"type":"ping","data":{},"timestamp":1}"#)
            .await;

        let _ = rx.recv().await;
        assert!(!*fired.lock().unwrap());
    }

    #[tokio::test]
    async fn application_topic_receives_payload() {
        let (router, registry, _rx, _state) = connected_router().await;

        let received: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&received);
        registry.on("metric", move |payload| {
            *slot.lock().unwrap() = Some(payload.clone());
        });

        router
            .route_text(r#"{"type":"metric","data":{"v":1},"timestamp":5}"#)
            .await;

        assert_eq!(
            received.lock().unwrap().take().unwrap(),
            serde_json::json!({ "v": 1 })
        );
    }

    #[tokio::test]
    async fn malformed_inbound_is_dropped() {
        let (router, registry, _rx, _state) = connected_router().await;

        let fired = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&fired);
        registry.on("metric", move |_| {
            *flag.lock().unwrap() = true;
        });

        router.route_text("not json at all").await;
        router.route_text(r#"{"data":{"v":1}}"#).await;

        assert!(!*fired.lock().unwrap());
    }
}
