use std::time::Duration;
use tokio::time::sleep;

/// Linear backoff for reconnection: the delay before attempt `n` is
/// `base × n`. The growth curve is deliberately linear, not exponential;
/// the attempt counter itself lives in the client state so the backoff
/// only does arithmetic.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Delay before the given 1-indexed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt.max(1))
    }

    /// Sleep out the delay for the given attempt.
    pub async fn wait(&self, attempt: u32) {
        sleep(self.delay_for_attempt(attempt)).await;
    }
}
