// Infrastructure module - background task lifecycle and reconnect timing
pub mod backoff;
pub mod task_manager;

pub use backoff::Backoff;
pub use task_manager::TaskManager;
