//! # Agent Realtime
//!
//! A resilient realtime channel for agent-to-dashboard communication:
//! a WebSocket client with automatic budgeted reconnection, offline
//! message queueing, heartbeat liveness tracking, and topic-based
//! message dispatch.
//!
//! ## Example
//!
//! ```no_run
//! use agent_realtime::{ClientOptions, RealtimeClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::new(
//!         "ws://localhost:8000/ws",
//!         ClientOptions {
//!             max_reconnect_attempts: 10,
//!             ..Default::default()
//!         },
//!     );
//!
//!     client.on("task_update", |payload| {
//!         println!("task update: {}", payload);
//!     });
//!
//!     client.connect().await?;
//!     client.send("status", serde_json::json!({ "state": "idle" })).await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dispatch;
pub mod global;
pub mod heartbeat;
pub mod infrastructure;
pub mod types;

pub use client::{
    ClientOptions, ConnectionManager, ConnectionState, RealtimeClient, RealtimeClientBuilder,
    Stats,
};
pub use dispatch::{ListenerHandle, ListenerRegistry};
pub use global::{init_default, try_default};
pub use heartbeat::HeartbeatMonitor;
pub use types::{Envelope, RealtimeError, Result};
