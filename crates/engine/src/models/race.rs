use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;

use super::duration_secs;

/// Identifies a race by name and lap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct RaceKey {
    pub race_name: String,
    pub lap: u32,
}

impl RaceKey {
    pub fn new(race_name: impl Into<String>, lap: u32) -> Self {
        Self {
            race_name: race_name.into(),
            lap,
        }
    }
}

impl fmt::Display for RaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.race_name, self.lap)
    }
}

/// Timing state of a vehicle within one race.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RacePhase {
    #[default]
    NotStarted,
    Racing,
    Finished,
}

/// Accumulated metrics for one vehicle in one race.
///
/// Time and energy are accumulated by checkpoint settlement: every telemetry
/// message credits the time elapsed since the previous checkpoint, and only
/// while the vehicle is [`RacePhase::Racing`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RaceMetrics {
    #[serde(default)]
    pub phase: RacePhase,
    #[serde(default)]
    pub points: i32,
    #[serde(default)]
    pub energy_wh: f64,
    /// Time credited while racing, in seconds.
    #[serde(default, with = "duration_secs")]
    #[schema(value_type = f64)]
    pub race_time: Duration,
    /// Wall-clock time between start and finish, in seconds.
    #[serde(default, with = "duration_secs")]
    #[schema(value_type = f64)]
    pub wall_time: Duration,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    checkpoint: Option<DateTime<Utc>>,
}

impl RaceMetrics {
    /// Fresh metrics for a vehicle that starts racing at `now`.
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            phase: RacePhase::Racing,
            started_at: Some(now),
            checkpoint: Some(now),
            ..Self::default()
        }
    }

    /// Metrics holding only a point value (no timing).
    pub fn with_points(points: i32) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == RacePhase::Racing
    }

    pub fn is_finished(&self) -> bool {
        self.phase == RacePhase::Finished
    }

    pub fn checkpoint(&self) -> Option<DateTime<Utc>> {
        self.checkpoint
    }

    /// Settles the time since the last checkpoint and advances it to `now`.
    ///
    /// Returns the duration credited to the race, which is zero unless the
    /// vehicle is racing. A `now` earlier than the checkpoint settles nothing
    /// and leaves the checkpoint where it is.
    pub fn settle(&mut self, now: DateTime<Utc>) -> Duration {
        let delta = match self.checkpoint {
            Some(checkpoint) => (now - checkpoint).to_std().unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        };
        self.checkpoint = Some(self.checkpoint.map_or(now, |checkpoint| checkpoint.max(now)));

        if !self.is_active() {
            return Duration::ZERO;
        }
        self.race_time += delta;
        delta
    }

    /// Adds `watts` over `credited` time to the energy total.
    pub fn add_energy(&mut self, watts: f64, credited: Duration) -> f64 {
        if self.is_active() {
            self.energy_wh += watts * credited.as_secs_f64() / 3600.0;
        }
        self.energy_wh
    }

    /// Freezes the metrics and records wall time since the start.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        if let Some(started_at) = self.started_at {
            self.wall_time = (now - started_at).to_std().unwrap_or(Duration::ZERO);
        }
        self.phase = RacePhase::Finished;
    }
}

/// A lapped race with a target distance and per-vehicle metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Race {
    pub race_name: String,
    pub lap: u32,
    /// Target distance in meters.
    pub length: f64,
    #[serde(default)]
    pub metrics: BTreeMap<String, RaceMetrics>,
}

impl Race {
    pub fn new(key: RaceKey, length: f64) -> Self {
        Self {
            race_name: key.race_name,
            lap: key.lap,
            length,
            metrics: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> RaceKey {
        RaceKey::new(self.race_name.clone(), self.lap)
    }

    pub fn length_km(&self) -> f64 {
        self.length / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_race_key_display() {
        assert_eq!(RaceKey::new("sprint", 2).to_string(), "sprint_2");
    }

    #[test]
    fn test_settle_credits_time_only_while_racing() {
        let mut metrics = RaceMetrics::started(at(0));
        assert_eq!(metrics.settle(at(10)), Duration::from_secs(10));

        metrics.finish(at(12));
        assert_eq!(metrics.settle(at(20)), Duration::ZERO);
        assert_eq!(metrics.race_time, Duration::from_secs(10));
        assert_eq!(metrics.checkpoint(), Some(at(20)));
    }

    #[test]
    fn test_settle_ignores_clock_regression() {
        let mut metrics = RaceMetrics::started(at(0));
        metrics.settle(at(10));
        assert_eq!(metrics.settle(at(5)), Duration::ZERO);
        assert_eq!(metrics.checkpoint(), Some(at(10)));
        assert_eq!(metrics.settle(at(11)), Duration::from_secs(1));
    }

    #[test]
    fn test_energy_is_power_times_hours() {
        let mut metrics = RaceMetrics::started(at(0));
        let credited = metrics.settle(at(0) + TimeDelta::minutes(30));
        let total = metrics.add_energy(200.0, credited);
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_finish_records_wall_time() {
        let mut metrics = RaceMetrics::started(at(0));
        metrics.finish(at(90));
        assert!(metrics.is_finished());
        assert!(!metrics.is_active());
        assert_eq!(metrics.wall_time, Duration::from_secs(90));
    }

    #[test]
    fn test_metrics_serialize_durations_as_seconds() {
        let mut metrics = RaceMetrics::started(at(0));
        metrics.settle(at(3));
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["race_time"], 3.0);
        assert_eq!(json["phase"], "racing");
        assert!(json.get("checkpoint").is_none());
    }
}
