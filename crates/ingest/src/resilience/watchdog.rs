use engine::activity::ActivityClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::traits::Transport;

/// Default watchdog check interval.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Default silence tolerated before the connection is considered stalled.
pub const STALL_THRESHOLD: Duration = Duration::from_secs(10);

/// Forces a disconnect when no inbound activity has been seen for too long,
/// even if the transport still reports itself connected.
pub struct TransportWatchdog {
    transport: Arc<dyn Transport>,
    activity: ActivityClock,
    interval: Duration,
    threshold: Duration,
}

impl TransportWatchdog {
    pub fn new(transport: Arc<dyn Transport>, activity: ActivityClock) -> Self {
        Self {
            transport,
            activity,
            interval: WATCHDOG_INTERVAL,
            threshold: STALL_THRESHOLD,
        }
    }

    pub fn with_timing(mut self, interval: Duration, threshold: Duration) -> Self {
        self.interval = interval;
        self.threshold = threshold;
        self
    }

    /// One check. Returns `true` when the transport was disconnected.
    ///
    /// A transport that is already down is left to the reconnector. The
    /// activity clock is touched after a forced disconnect, so one stall
    /// produces one disconnect.
    pub async fn check_once(&self) -> bool {
        if !self.transport.is_connected() {
            debug!("Transport down, watchdog waiting for reconnect");
            return false;
        }

        let elapsed = self.activity.elapsed();
        if elapsed <= self.threshold {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "Transport watchdog healthy");
            return false;
        }

        warn!(
            elapsed_ms = elapsed.as_millis() as u64,
            threshold_ms = self.threshold.as_millis() as u64,
            "STALL DETECTED: no inbound messages, forcing transport disconnect"
        );
        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "Forced disconnect failed");
        }
        self.activity.touch();
        true
    }

    /// Runs until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.check_once().await;
                }
            }
        }

        info!("Transport watchdog stopped");
    }
}
