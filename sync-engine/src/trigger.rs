//! Periodic drain trigger.
//!
//! Reconnect events come from outside the engine (the platform's network
//! monitor calls [`SyncEngine::trigger_sync`] directly). Deployments
//! without a reliable reconnect signal run this interval trigger instead;
//! it also papers over a missed wakeup, since triggering a drain with
//! nothing eligible is free.

use crate::engine::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn a background task that requests a drain on a fixed interval.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_interval_trigger(
    engine: Arc<SyncEngine>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Interval sync trigger started (period: {:?})", period);

        let mut timer = interval(period);
        // The first tick completes immediately
        timer.tick().await;

        loop {
            timer.tick().await;
            engine.trigger_sync();
        }
    })
}
