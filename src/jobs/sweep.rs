//! Background job: purge expired tokens.
//!
//! Runs every `interval` (five minutes by default). A failed sweep is logged
//! and retried on the next tick; it never stops the job. Each sweep is a
//! single store transaction, so cancelling between ticks is always safe.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::lifecycle::LifecycleManager;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Spawn the background sweep task. Call this once at startup.
pub fn spawn(
    manager: LifecycleManager,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("token sweep stopped");
                    break;
                }
                _ = ticker.tick() => run_once(&manager).await,
            }
        }
    })
}

async fn run_once(manager: &LifecycleManager) {
    match manager.sweep().await {
        Ok(0) => tracing::debug!("token sweep: nothing to remove"),
        Ok(_) => {}
        Err(e) => tracing::error!("token sweep failed: {}", e),
    }
}
