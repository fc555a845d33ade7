use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::sessions::SessionRegistry;
use crate::models::{LeaderboardEntry, LiveStatus};

/// Per-vehicle live projection and its fan-out to sessions.
///
/// The status map and the session registry have separate locks; no lock on
/// the map is held while delivering to sessions.
#[derive(Debug, Default)]
pub struct LiveDataHub {
    statuses: Mutex<BTreeMap<String, LiveStatus>>,
    sessions: SessionRegistry,
}

impl LiveDataHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            statuses: Mutex::new(BTreeMap::new()),
            sessions: SessionRegistry::new(queue_capacity),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Applies `apply` to a registered vehicle. Unknown ids are dropped.
    fn update(&self, vehicle_id: &str, apply: impl FnOnce(&mut LiveStatus)) {
        let mut statuses = self.statuses.lock();
        if let Some(status) = statuses.get_mut(vehicle_id) {
            apply(status);
            status.updated_at = Some(Utc::now());
        }
    }

    pub fn register_or_refresh(&self, vehicle_id: &str, username: &str, avatar: &str) {
        let mut statuses = self.statuses.lock();
        let status = statuses
            .entry(vehicle_id.to_string())
            .or_insert_with(|| LiveStatus {
                key: vehicle_id.to_string(),
                vehicle_id: vehicle_id.to_string(),
                ..LiveStatus::default()
            });
        status.username = username.to_string();
        status.avatar = avatar.to_string();
        status.updated_at = Some(Utc::now());
    }

    pub fn update_rank_and_points(
        &self,
        vehicle_id: &str,
        categories: Vec<String>,
        points: Vec<i32>,
        rank: usize,
    ) {
        self.update(vehicle_id, |status| {
            status.categories = categories;
            status.points = points;
            status.rank = rank;
        });
    }

    /// Applies overall standings to every ranked vehicle.
    pub fn apply_standings(&self, standings: &[LeaderboardEntry]) {
        for entry in standings {
            self.update_rank_and_points(
                &entry.vehicle_id,
                entry.categories.clone(),
                entry.points.clone(),
                entry.rank,
            );
        }
    }

    pub fn update_position(&self, vehicle_id: &str, lat: f64, lon: f64, speed: f64) {
        self.update(vehicle_id, |status| {
            status.lat = lat;
            status.lon = lon;
            status.speed = speed;
        });
    }

    pub fn update_acceleration(&self, vehicle_id: &str, magnitude: f64) {
        self.update(vehicle_id, |status| status.acceleration = magnitude);
    }

    pub fn update_power(&self, vehicle_id: &str, watts: f64, volts: f64) {
        self.update(vehicle_id, |status| {
            status.power = watts;
            status.voltage = volts;
        });
    }

    pub fn remove(&self, vehicle_id: &str) {
        self.statuses.lock().remove(vehicle_id);
    }

    pub fn clear(&self) {
        self.statuses.lock().clear();
    }

    pub fn status(&self, vehicle_id: &str) -> Option<LiveStatus> {
        self.statuses.lock().get(vehicle_id).cloned()
    }

    /// Serializes the status map keyed by vehicle id.
    ///
    /// Returns an empty string if serialization fails.
    pub fn snapshot(&self) -> String {
        let statuses = self.statuses.lock();
        match serde_json::to_string(&*statuses) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize live data");
                String::new()
            }
        }
    }

    /// Pushes one snapshot to all sessions; returns the number of deliveries.
    pub fn broadcast_once(&self) -> usize {
        if self.sessions.is_empty() {
            return 0;
        }
        let payload = self.snapshot();
        if payload.is_empty() {
            return 0;
        }
        self.sessions.broadcast(&payload)
    }

    /// Broadcasts a snapshot every `period` until cancelled.
    pub async fn run_broadcast(&self, period: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = period.as_millis() as u64, "Live broadcast started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let delivered = self.broadcast_once();
                    debug!(delivered, "Live data broadcast");
                }
            }
        }

        info!("Live broadcast stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_updates_coalesce_into_one_status() {
        let hub = LiveDataHub::default();
        hub.register_or_refresh("5", "Dana", "a.png");
        hub.update_position("5", 56.6, 23.7, 12.3);
        hub.update_power("5", 98.0, 62.0);
        hub.update_acceleration("5", 0.2);

        let status = hub.status("5").unwrap();
        assert_eq!(status.key, "5");
        assert_eq!(status.username, "Dana");
        assert_eq!(status.speed, 12.3);
        assert_eq!(status.voltage, 62.0);
        assert!(status.updated_at.is_some());
    }

    #[test]
    fn test_unregistered_vehicle_gets_no_status() {
        let hub = LiveDataHub::default();
        hub.update_power("9", 10.0, 48.0);
        hub.update_position("9", 1.0, 2.0, 3.0);
        hub.update_acceleration("9", 0.5);
        hub.update_rank_and_points("9", vec!["sprint".to_string()], vec![3], 1);

        assert!(hub.status("9").is_none());
        assert_eq!(hub.snapshot(), "{}");
    }

    #[test]
    fn test_snapshot_is_keyed_by_vehicle() {
        let hub = LiveDataHub::default();
        hub.register_or_refresh("5", "Dana", "a.png");
        hub.update_position("5", 1.0, 2.0, 3.0);
        hub.update_rank_and_points("5", vec!["sprint".to_string()], vec![10], 1);

        let json: serde_json::Value = serde_json::from_str(&hub.snapshot()).unwrap();
        assert_eq!(json["5"]["ID"], "5");
        assert_eq!(json["5"]["spd"], 3.0);
        assert_eq!(json["5"]["position"], 1);
        assert_eq!(json["5"]["CategoryPoints"][0], 10);
    }

    #[test]
    fn test_broadcast_without_sessions_is_a_noop() {
        let hub = LiveDataHub::default();
        hub.register_or_refresh("1", "Ash", "");
        hub.update_power("1", 10.0, 48.0);
        assert_eq!(hub.broadcast_once(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_loop_delivers_until_cancelled() {
        let hub = Arc::new(LiveDataHub::new(4));
        hub.register_or_refresh("1", "Ash", "");
        hub.update_power("1", 10.0, 48.0);
        let (_id, mut rx) = hub.sessions().open();
        let shutdown = CancellationToken::new();

        let task = {
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { hub.run_broadcast(Duration::from_secs(1), shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.cancel();
        task.await.unwrap();

        let mut received = 0;
        while let Ok(payload) = rx.try_recv() {
            assert!(payload.contains("\"ID\":\"1\""));
            received += 1;
        }
        assert_eq!(received, 3);
    }
}
