use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global race settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Settings {
    /// Energy coefficient used to derive each vehicle's max current.
    #[serde(default)]
    pub race_coefficient: f64,
    /// Speed threshold for the governor (km/h). Zero or less disables it.
    #[serde(default)]
    pub max_speed: f64,
}
