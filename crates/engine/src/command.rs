//! Outbound power supply commands.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::Vehicle;

pub const COMMAND_TOPIC_PREFIX: &str = "PSU_IN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStatus {
    Off = 0,
    On = 1,
}

/// Voltage/current set-point for one vehicle's power supply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerCommand {
    pub voltage: f64,
    pub current: f64,
    pub status: PowerStatus,
}

#[derive(Serialize)]
struct PsuPayload {
    #[serde(rename = "U")]
    voltage: i64,
    #[serde(rename = "I")]
    current: i64,
    #[serde(rename = "Status")]
    status: u8,
}

impl PowerCommand {
    /// Full power at the vehicle's target voltage and max current.
    pub fn setpoint(vehicle: &Vehicle) -> Self {
        Self {
            voltage: vehicle.target_voltage,
            current: vehicle.max_current,
            status: PowerStatus::On,
        }
    }

    /// Zero current, used to cut a vehicle's power.
    pub fn cutoff(vehicle: &Vehicle) -> Self {
        Self {
            voltage: vehicle.target_voltage,
            current: 0.0,
            status: PowerStatus::Off,
        }
    }

    pub fn topic(vehicle_id: &str) -> String {
        format!("{COMMAND_TOPIC_PREFIX}/{vehicle_id}")
    }

    /// Encodes the command in hundredths, as the supply expects.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = PsuPayload {
            voltage: (self.voltage * 100.0).round() as i64,
            current: (self.current * 100.0).round() as i64,
            status: self.status as u8,
        };
        Ok(serde_json::to_vec(&payload)?)
    }
}

/// Sink for messages published back to vehicles.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle() -> Vehicle {
        Vehicle {
            vehicle_id: "12".to_string(),
            username: "Carol".to_string(),
            avatar: String::new(),
            target_voltage: 48.5,
            max_current: 3.456,
            mass: 80.0,
            category: "open".to_string(),
            current_race: None,
        }
    }

    #[test]
    fn test_setpoint_payload_is_in_hundredths() {
        let bytes = PowerCommand::setpoint(&vehicle()).encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["U"], 4850);
        assert_eq!(json["I"], 346);
        assert_eq!(json["Status"], 1);
    }

    #[test]
    fn test_cutoff_sends_zero_current() {
        let bytes = PowerCommand::cutoff(&vehicle()).encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["I"], 0);
        assert_eq!(json["Status"], 0);
    }

    #[test]
    fn test_topic_embeds_vehicle_id() {
        assert_eq!(PowerCommand::topic("12"), "PSU_IN/12");
    }
}
