use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// One archived reading as it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ArchivedReading {
    #[schema(value_type = Object)]
    pub fields: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Newest archived reading of each measurement for one vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct LatestTelemetry {
    pub vehicle_id: String,
    pub power: Option<ArchivedReading>,
    pub position: Option<ArchivedReading>,
    pub acceleration: Option<ArchivedReading>,
    pub suspension: Option<ArchivedReading>,
}

impl LatestTelemetry {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            ..Self::default()
        }
    }

    /// Keeps `reading` unless a newer one is already held for `measurement`.
    /// Unknown measurements are ignored.
    pub fn offer(&mut self, measurement: &str, reading: ArchivedReading) {
        let slot = match measurement {
            "power" => &mut self.power,
            "position" => &mut self.position,
            "acceleration" => &mut self.acceleration,
            "suspension" => &mut self.suspension,
            _ => return,
        };
        if slot
            .as_ref()
            .is_none_or(|held| held.recorded_at <= reading.recorded_at)
        {
            *slot = Some(reading);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_none()
            && self.position.is_none()
            && self.acceleration.is_none()
            && self.suspension.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn reading(secs: i64, voltage: f64) -> ArchivedReading {
        ArchivedReading {
            fields: json!({ "voltage": voltage }),
            recorded_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_offer_keeps_newest_reading() {
        let mut latest = LatestTelemetry::new("7");
        latest.offer("power", reading(20, 48.0));
        latest.offer("power", reading(10, 36.0));

        assert_eq!(latest.power, Some(reading(20, 48.0)));
        assert!(latest.position.is_none());
    }

    #[test]
    fn test_unknown_measurement_is_ignored() {
        let mut latest = LatestTelemetry::new("7");
        latest.offer("temperature", reading(10, 1.0));
        assert!(latest.is_empty());
    }
}
