use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::race::RaceKey;

/// A competing vehicle and its electrical parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub username: String,
    pub avatar: String,
    /// Set-point voltage sent to the vehicle's power supply (V).
    pub target_voltage: f64,
    /// Derived from `mass * race_coefficient / target_voltage` (A).
    pub max_current: f64,
    /// Vehicle plus driver mass (kg).
    pub mass: f64,
    /// Age/weight category used for leaderboard grouping.
    pub category: String,
    /// The race this vehicle is currently timed in, if any.
    #[serde(default)]
    pub current_race: Option<RaceKey>,
}

impl Vehicle {
    /// Computes the max current for the given race coefficient.
    ///
    /// Returns `None` when the target voltage is zero or negative.
    pub fn max_current_for(&self, race_coefficient: f64) -> Option<f64> {
        if self.target_voltage <= 0.0 {
            return None;
        }
        Some(self.mass * race_coefficient / self.target_voltage)
    }
}
