use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Listener callback invoked with the envelope payload.
pub type Callback = Arc<dyn Fn(&serde_json::Value) + Send + Sync + 'static>;

struct ListenerEntry {
    id: u64,
    once: bool,
    callback: Callback,
}

/// Handle returned by `on`/`once`; dropping it does nothing, calling
/// [`unsubscribe`](ListenerHandle::unsubscribe) removes the listener.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    topic: String,
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove the listener this handle refers to. Safe to call more than
    /// once; later calls are no-ops.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.topic, self.id);
        }
    }
}

/// Maps topic names to ordered listener callbacks.
///
/// Registration order is invocation order. Identical callbacks are not
/// deduplicated; registering twice means being invoked twice. The registry
/// survives reconnect cycles untouched.
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<String, Vec<ListenerEntry>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register a listener for a topic. Returns the unsubscribe handle.
    pub fn on<F>(self: &Arc<Self>, topic: &str, callback: F) -> ListenerHandle
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.register(topic, Arc::new(callback), false)
    }

    /// Register a listener that removes itself after its first invocation.
    pub fn once<F>(self: &Arc<Self>, topic: &str, callback: F) -> ListenerHandle
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.register(topic, Arc::new(callback), true)
    }

    fn register(self: &Arc<Self>, topic: &str, callback: Callback, once: bool) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.lock().expect("listener registry poisoned");
        listeners
            .entry(topic.to_string())
            .or_default()
            .push(ListenerEntry { id, once, callback });

        ListenerHandle {
            topic: topic.to_string(),
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Remove a specific listener; releases the topic entry when it was the
    /// last one. Unknown ids are ignored.
    pub fn remove(&self, topic: &str, id: u64) {
        let mut listeners = self.listeners.lock().expect("listener registry poisoned");
        if let Some(entries) = listeners.get_mut(topic) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                listeners.remove(topic);
            }
        }
    }

    /// Invoke every listener registered for `topic`, in registration order,
    /// synchronously on the calling task. A panicking listener is reported
    /// and swallowed; the remaining listeners still run.
    pub fn emit(&self, topic: &str, payload: &serde_json::Value) {
        let callbacks: Vec<Callback> = {
            let mut listeners = self.listeners.lock().expect("listener registry poisoned");
            let Some(entries) = listeners.get_mut(topic) else {
                return;
            };

            let callbacks = entries
                .iter()
                .map(|entry| Arc::clone(&entry.callback))
                .collect();

            entries.retain(|entry| !entry.once);
            if entries.is_empty() {
                listeners.remove(topic);
            }
            callbacks
        };

        for callback in callbacks {
            let result = catch_unwind(AssertUnwindSafe(|| callback(payload)));
            if result.is_err() {
                tracing::error!(topic, "Listener panicked during dispatch; continuing");
            }
        }
    }

    /// Total number of registered listeners across all topics.
    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .expect("listener registry poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any listener is registered for the topic.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.listeners
            .lock()
            .expect("listener registry poisoned")
            .contains_key(topic)
    }
}
