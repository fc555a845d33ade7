pub mod leaderboard;
pub mod live;
pub mod race;
pub mod settings;
pub mod telemetry;
pub mod vehicle;

pub use leaderboard::{ALL_GROUP, LeaderboardEntry};
pub use live::LiveStatus;
pub use race::{Race, RaceKey, RaceMetrics, RacePhase};
pub use settings::Settings;
pub use telemetry::{AccelerationReading, PositionReading, PowerReading, SuspensionEvent};
pub use vehicle::Vehicle;

/// Serializes a `Duration` as fractional seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}
