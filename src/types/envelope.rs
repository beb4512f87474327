use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::constants::{TOPIC_PING, TOPIC_PONG};

/// The atomic unit exchanged over the channel.
///
/// Wire format is a JSON object with exactly the fields `type` (the routing
/// topic), `data` (arbitrary JSON payload) and `timestamp` (integer epoch
/// milliseconds). Inbound text missing `type` does not parse and is dropped
/// by the router.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub topic: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: u64,
}

impl Envelope {
    /// Create an envelope stamped with the current time.
    pub fn new(topic: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            data,
            timestamp: now_millis(),
        }
    }

    /// Heartbeat probe envelope.
    pub fn ping() -> Self {
        let ts = now_millis();
        Self {
            topic: TOPIC_PING.to_string(),
            data: serde_json::json!({ "timestamp": ts }),
            timestamp: ts,
        }
    }

    /// Heartbeat response envelope.
    pub fn pong() -> Self {
        let ts = now_millis();
        Self {
            topic: TOPIC_PONG.to_string(),
            data: serde_json::json!({ "timestamp": ts }),
            timestamp: ts,
        }
    }

    /// Whether this envelope belongs to the heartbeat monitor.
    pub fn is_heartbeat(&self) -> bool {
        self.topic == TOPIC_PING || self.topic == TOPIC_PONG
    }
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
