//! Typed telemetry readings, as decoded from the vehicle channels.

use serde::Serialize;

/// Power supply reading, already scaled to SI units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PowerReading {
    pub output_voltage: f64,
    pub output_current: f64,
    pub output_power: f64,
    pub input_voltage: f64,
    /// Energy counter as reported by the supply itself.
    pub energy_wh: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PositionReading {
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccelerationReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelerationReading {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Suspension switch event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SuspensionEvent {
    Speed(f64),
    Reset(i64),
}
