//! Client lifecycle: builder, connection state machine, and the
//! [`RealtimeClient`] facade itself.

mod builder;
mod connection;
mod core;
mod state;

pub use builder::{ClientOptions, RealtimeClientBuilder};
pub use connection::{ConnectionManager, ConnectionState};
pub use core::{RealtimeClient, Stats};
pub(crate) use state::ClientState;
