//! Background task that bounds the limiter's memory

use std::time::Duration;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::RateLimiter;

/// Stops the sweeper when shut down or dropped
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Rate limiter sweeper ended abnormally: {}", e);
        }
    }
}

/// Every `interval`, clear the limiter if it tracks more than `threshold` keys
pub fn spawn_sweeper(limiter: RateLimiter, interval: Duration, threshold: usize) -> SweeperHandle {
    let (shutdown, mut stop) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let dropped = limiter.sweep(threshold);
                    if dropped > 0 {
                        tracing::info!(dropped, threshold, "Rate limiter state cleared");
                    }
                }
                // Also fires when the handle is dropped
                _ = stop.changed() => break,
            }
        }

        tracing::debug!("Rate limiter sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}
