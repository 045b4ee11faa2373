use std::time::Duration;

use async_trait::async_trait;

/// Sleeping goes through this seam so tests can simulate long waits without
/// real delay.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps cooperatively on the runtime; a waiting step never blocks a worker
/// thread.
#[derive(Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
