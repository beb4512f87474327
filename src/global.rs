//! Process-wide default client.
//!
//! Most agents talk to exactly one dashboard, so a shared instance saves
//! threading a handle through every call site. Call [`init_default`] once
//! during startup (inside the tokio runtime) and [`try_default`] everywhere
//! else.

use std::sync::OnceLock;

use crate::client::{ClientOptions, RealtimeClient};

static DEFAULT_CLIENT: OnceLock<RealtimeClient> = OnceLock::new();

/// Initialize the process-wide client. The first call wins; later calls
/// return the already-initialized instance and ignore their arguments.
pub fn init_default(endpoint: impl Into<String>, options: ClientOptions) -> &'static RealtimeClient {
    DEFAULT_CLIENT.get_or_init(|| RealtimeClient::new(endpoint, options))
}

/// The process-wide client, if [`init_default`] has run.
pub fn try_default() -> Option<&'static RealtimeClient> {
    DEFAULT_CLIENT.get()
}
