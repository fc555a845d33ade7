use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::vehicle::validate_vehicle_id;
use crate::models::RaceKey;

/// One schedule entry in a `SetSchedule` request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RaceRequest {
    #[validate(length(min = 1, max = 255, message = "Race name is required"))]
    pub race_name: String,

    #[serde(default)]
    pub lap: u32,

    /// Target distance in meters.
    #[validate(range(min = 0.0, message = "Length cannot be negative"))]
    #[serde(default)]
    pub length: f64,
}

impl RaceRequest {
    pub fn key(&self) -> RaceKey {
        RaceKey::new(self.race_name.clone(), self.lap)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct StartRaceRequest {
    #[validate(length(min = 1, max = 255))]
    pub race_name: String,

    #[serde(default)]
    pub lap: u32,

    #[validate(custom(function = "validate_vehicle_id"))]
    pub vehicle_id: String,
}

impl StartRaceRequest {
    pub fn key(&self) -> RaceKey {
        RaceKey::new(self.race_name.clone(), self.lap)
    }
}

/// Result of one item of a bulk start.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartRaceOutcome {
    pub race_name: String,
    pub lap: u32,
    pub vehicle_id: String,
    pub started: bool,
    /// Error classification when the item was rejected.
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct FinishVehicleRequest {
    #[validate(custom(function = "validate_vehicle_id"))]
    pub vehicle_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinishVehicleResponse {
    pub vehicle_id: String,
    pub race_name: String,
    pub lap: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct FinishRaceRequest {
    #[validate(length(min = 1, max = 255))]
    pub race_name: String,

    #[serde(default)]
    pub lap: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinishRaceResponse {
    pub race_name: String,
    pub lap: u32,
    /// Vehicles whose timing was stopped by this request.
    pub finished: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ResultsQuery {
    pub lap: Option<u32>,
}

/// Derived efficiency figures for one vehicle in one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RaceResult {
    pub race_name: String,
    pub lap: u32,
    pub vehicle_id: String,
    pub username: String,
    pub avatar: String,
    /// Wh
    pub used_energy: f64,
    /// Wh per km per kg
    pub efficiency: f64,
    /// km per kWh
    pub distance_efficiency: f64,
    /// W
    pub average_power: f64,
    /// km/h
    pub average_speed: f64,
    /// Seconds of credited race time.
    pub elapsed_time: f64,
    pub finished: bool,
}
