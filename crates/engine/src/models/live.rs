use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Read-optimized live projection of one vehicle, as pushed to dashboards.
///
/// Field names follow the dashboard's wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LiveStatus {
    pub key: String,
    #[serde(rename = "ID")]
    pub vehicle_id: String,
    pub username: String,
    pub avatar: String,
    #[serde(rename = "CategoryNames")]
    pub categories: Vec<String>,
    #[serde(rename = "CategoryPoints")]
    pub points: Vec<i32>,
    #[serde(rename = "position")]
    pub rank: usize,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "spd")]
    pub speed: f64,
    pub power: f64,
    pub acceleration: f64,
    pub voltage: f64,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}
