use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Timestamp of the most recent inbound activity (telemetry or HTTP).
///
/// Cloning shares the same underlying timestamp.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    last_activity_ms: Arc<AtomicU64>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            last_activity_ms: Arc::new(AtomicU64::new(now_ms())),
        }
    }

    pub fn touch(&self) {
        self.last_activity_ms.store(now_ms(), Ordering::Relaxed);
    }

    /// Time since the last recorded activity.
    pub fn elapsed(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_ms().saturating_sub(last))
    }

    /// Moves the last activity into the past.
    pub fn rewind(&self, by: Duration) {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.last_activity_ms
            .store(last.saturating_sub(by), Ordering::Relaxed);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
