pub mod constants;
pub mod envelope;
pub mod error;

pub use constants::*;
pub use envelope::{now_millis, Envelope};
pub use error::{RealtimeError, Result};
