/// Reserved heartbeat topics, consumed internally and never dispatched.
pub const TOPIC_PING: &str = "ping";
pub const TOPIC_PONG: &str = "pong";

/// Lifecycle event names emitted through the listener registry.
pub mod lifecycle_events {
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const FAILED: &str = "failed";
    pub const ERROR: &str = "error";
    pub const STATE_CHANGE: &str = "stateChange";
}

/// Default heartbeat interval (milliseconds)
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 30_000;

/// Default reconnect backoff unit (milliseconds); delay before attempt n is n times this
pub const DEFAULT_RECONNECT_INTERVAL: u64 = 1_000;

/// Default reconnection attempt budget
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default transport open timeout (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10_000;

/// Default outbound queue cap; oldest entries are evicted beyond this
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1_000;

/// WebSocket normal closure code
pub const WS_CLOSE_NORMAL: u16 = 1000;

/// True for topics the heartbeat monitor owns.
pub fn is_reserved_topic(topic: &str) -> bool {
    topic == TOPIC_PING || topic == TOPIC_PONG
}
