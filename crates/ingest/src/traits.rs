use chrono::{DateTime, Utc};
use engine::dto::telemetry::LatestTelemetry;
use engine::models::RaceKey;
use serde_json::Value;

use crate::Result;

/// A raw message received from the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Pub/sub connection supervised by the resilience loops.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Builds a fresh client from the last-known options and connects it.
    async fn connect(&self) -> Result<()>;

    async fn subscribe(&self, filters: &[String]) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// One decoded message, as stored in the time-series archive.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPoint {
    pub measurement: &'static str,
    pub vehicle_id: String,
    pub race: Option<RaceKey>,
    pub fields: Value,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TelemetryArchive: Send + Sync {
    async fn record(&self, point: &TelemetryPoint) -> Result<()>;

    /// Newest stored point per measurement for `vehicle_id`.
    async fn latest(&self, vehicle_id: &str) -> Result<LatestTelemetry>;

    fn name(&self) -> &'static str;
}
