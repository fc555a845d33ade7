use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine::dto::telemetry::{ArchivedReading, LatestTelemetry};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::Result;
use crate::traits::{TelemetryArchive, TelemetryPoint};

/// Stores telemetry points in the `telemetry_points` table.
pub struct PostgresArchive {
    pool: PgPool,
}

impl PostgresArchive {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and applies the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Telemetry archive ready");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl TelemetryArchive for PostgresArchive {
    async fn record(&self, point: &TelemetryPoint) -> Result<()> {
        let (race_name, lap) = match &point.race {
            Some(race) => (Some(race.race_name.as_str()), Some(i64::from(race.lap))),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO telemetry_points (measurement, vehicle_id, race_name, lap, fields, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(point.measurement)
        .bind(&point.vehicle_id)
        .bind(race_name)
        .bind(lap)
        .bind(&point.fields)
        .bind(point.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest(&self, vehicle_id: &str) -> Result<LatestTelemetry> {
        let rows: Vec<(String, Value, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (measurement) measurement, fields, recorded_at
            FROM telemetry_points
            WHERE vehicle_id = $1
            ORDER BY measurement, recorded_at DESC
            "#,
        )
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;

        let mut latest = LatestTelemetry::new(vehicle_id);
        for (measurement, fields, recorded_at) in rows {
            latest.offer(&measurement, ArchivedReading { fields, recorded_at });
        }
        Ok(latest)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
