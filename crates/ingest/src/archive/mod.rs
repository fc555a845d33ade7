//! Time-series archive sinks.

pub mod postgres;

pub use postgres::PostgresArchive;

use async_trait::async_trait;
use engine::dto::telemetry::{ArchivedReading, LatestTelemetry};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::Result;
use crate::traits::{TelemetryArchive, TelemetryPoint};

/// Archive used when no database is configured. Only the newest point per
/// vehicle and measurement is retained.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    latest: Mutex<HashMap<String, LatestTelemetry>>,
}

#[async_trait]
impl TelemetryArchive for MemoryArchive {
    async fn record(&self, point: &TelemetryPoint) -> Result<()> {
        self.latest
            .lock()
            .entry(point.vehicle_id.clone())
            .or_insert_with(|| LatestTelemetry::new(&point.vehicle_id))
            .offer(
                point.measurement,
                ArchivedReading {
                    fields: point.fields.clone(),
                    recorded_at: point.recorded_at,
                },
            );
        Ok(())
    }

    async fn latest(&self, vehicle_id: &str) -> Result<LatestTelemetry> {
        Ok(self
            .latest
            .lock()
            .get(vehicle_id)
            .cloned()
            .unwrap_or_else(|| LatestTelemetry::new(vehicle_id)))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
