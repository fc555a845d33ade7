use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Vehicle;

/// One roster entry in a `SetRoster` request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VehicleRequest {
    #[validate(custom(function = "validate_vehicle_id"))]
    pub vehicle_id: String,

    #[validate(length(max = 255))]
    #[serde(default)]
    pub username: String,

    #[validate(length(max = 500))]
    #[serde(default)]
    pub avatar: String,

    #[serde(default)]
    pub target_voltage: f64,

    #[validate(range(min = 0.0, message = "Mass cannot be negative"))]
    #[serde(default)]
    pub mass: f64,

    #[validate(length(max = 100))]
    #[serde(default)]
    pub category: String,
}

/// Vehicle ids double as topic segments and must be integers.
pub fn validate_vehicle_id(vehicle_id: &str) -> Result<(), validator::ValidationError> {
    if !vehicle_id.is_empty() && vehicle_id.parse::<i64>().is_ok() {
        Ok(())
    } else {
        Err(validator::ValidationError::new("vehicle_id_not_numeric"))
    }
}

impl From<VehicleRequest> for Vehicle {
    fn from(req: VehicleRequest) -> Self {
        Self {
            vehicle_id: req.vehicle_id,
            username: req.username,
            avatar: req.avatar,
            target_voltage: req.target_voltage,
            max_current: 0.0,
            mass: req.mass,
            category: req.category,
            current_race: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(vehicle_id: &str, mass: f64) -> VehicleRequest {
        VehicleRequest {
            vehicle_id: vehicle_id.to_string(),
            username: "Bob".to_string(),
            avatar: String::new(),
            target_voltage: 48.0,
            mass,
            category: "open".to_string(),
        }
    }

    #[test]
    fn test_numeric_vehicle_id_is_valid() {
        assert!(request("42", 80.0).validate().is_ok());
    }

    #[test]
    fn test_non_numeric_vehicle_id_is_rejected() {
        assert!(request("car-42", 80.0).validate().is_err());
        assert!(request("", 80.0).validate().is_err());
    }

    #[test]
    fn test_negative_mass_is_rejected() {
        assert!(request("42", -1.0).validate().is_err());
    }
}
