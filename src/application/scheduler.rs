//! Periodic operation harness.
//!
//! Each pipeline operation runs as its own long-lived task on a fixed
//! period. A tick that aborts only logs; the next tick is the sole
//! recovery path, so nothing here ever takes the process down.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::warn;

use crate::application::RunError;

/// One schedulable pipeline operation.
#[async_trait]
pub trait Operation: Send {
    fn name(&self) -> &'static str;
    async fn tick(&mut self) -> Result<(), RunError>;
}

/// Spawn a task invoking `operation` every `period`. The first tick fires
/// immediately.
pub fn spawn_periodic<O: Operation + 'static>(mut operation: O, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = operation.tick().await {
                warn!("{} run aborted: {}", operation.name(), err);
            }
        }
    })
}
