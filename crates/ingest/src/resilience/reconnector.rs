use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::traits::Transport;

/// Default reconnect check interval.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Rebuilds the transport connection and its subscriptions whenever it drops.
pub struct Reconnector {
    transport: Arc<dyn Transport>,
    filters: Vec<String>,
    interval: Duration,
}

impl Reconnector {
    pub fn new(transport: Arc<dyn Transport>, filters: Vec<String>) -> Self {
        Self {
            transport,
            filters,
            interval: RECONNECT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One check. Returns `true` when a reconnect was performed.
    pub async fn tick_once(&self) -> Result<bool> {
        if self.transport.is_connected() {
            return Ok(false);
        }

        self.transport.connect().await?;
        self.transport.subscribe(&self.filters).await?;
        info!(filters = ?self.filters, "Transport reconnected and resubscribed");
        Ok(true)
    }

    /// Runs until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    match self.tick_once().await {
                        Ok(true) => {}
                        Ok(false) => debug!("Transport connected"),
                        Err(e) => warn!(error = %e, "Reconnect attempt failed"),
                    }
                }
            }
        }

        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "Disconnect on shutdown failed");
        }
        info!("Reconnector stopped");
    }
}
