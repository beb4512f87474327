// Dispatch module - listener registry and inbound message routing
pub mod registry;
pub(crate) mod router;

pub use registry::{Callback, ListenerHandle, ListenerRegistry};
pub(crate) use router::MessageRouter;
