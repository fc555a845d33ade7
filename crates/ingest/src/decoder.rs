//! Telemetry Decoder: turns raw transport messages into typed readings.
//!
//! Topics look like `<CHANNEL>/<vehicle-id>[/...]`. Power readings arrive in
//! hundredths and are scaled here; the supply's own energy counter is not.

use engine::models::{AccelerationReading, PositionReading, PowerReading, SuspensionEvent};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Power,
    Position,
    Acceleration,
    Suspension,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Power,
        Channel::Position,
        Channel::Acceleration,
        Channel::Suspension,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Channel::Power => "PSU_OUT",
            Channel::Position => "GPS_OUT",
            Channel::Acceleration => "Accel_OUT",
            Channel::Suspension => "SUS_OUT",
        }
    }

    /// Subscription filter covering every vehicle on this channel.
    pub fn filter(&self) -> String {
        format!("{}/#", self.prefix())
    }

    pub fn from_topic(topic: &str) -> Option<Channel> {
        let prefix = topic.split('/').next()?;
        Channel::ALL.into_iter().find(|c| c.prefix() == prefix)
    }

    /// Name used for archived points.
    pub fn measurement(&self) -> &'static str {
        match self {
            Channel::Power => "power",
            Channel::Position => "position",
            Channel::Acceleration => "acceleration",
            Channel::Suspension => "suspension",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Power(PowerReading),
    Position(PositionReading),
    Acceleration(AccelerationReading),
    Suspension(SuspensionEvent),
}

impl Reading {
    pub fn channel(&self) -> Channel {
        match self {
            Reading::Power(_) => Channel::Power,
            Reading::Position(_) => Channel::Position,
            Reading::Acceleration(_) => Channel::Acceleration,
            Reading::Suspension(_) => Channel::Suspension,
        }
    }

    /// Flat field map for the time-series archive.
    pub fn fields(&self) -> Value {
        match self {
            Reading::Power(p) => json!({
                "voltage": p.output_voltage,
                "current": p.output_current,
                "power": p.output_power,
                "input_voltage": p.input_voltage,
                "energy_wh": p.energy_wh,
            }),
            Reading::Position(p) => json!({ "lat": p.lat, "lon": p.lon, "speed": p.speed }),
            Reading::Acceleration(a) => json!({
                "x": a.x,
                "y": a.y,
                "z": a.z,
                "magnitude": a.magnitude(),
            }),
            Reading::Suspension(SuspensionEvent::Speed(speed)) => json!({ "speed": speed }),
            Reading::Suspension(SuspensionEvent::Reset(code)) => json!({ "reset": code }),
        }
    }
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub vehicle_id: String,
    pub reading: Reading,
}

#[derive(Debug, Default, Deserialize)]
struct PowerEnvelope {
    #[serde(rename = "PSU", default)]
    psu: PsuFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PsuFields {
    #[serde(rename = "Uop")]
    uop: f64,
    #[serde(rename = "Iop")]
    iop: f64,
    #[serde(rename = "Pop")]
    pop: f64,
    #[serde(rename = "Uip")]
    uip: f64,
    #[serde(rename = "Wh")]
    wh: f64,
}

#[derive(Debug, Default, Deserialize)]
struct PositionEnvelope {
    #[serde(rename = "GPS", default)]
    gps: GpsFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GpsFields {
    #[serde(rename = "Lat")]
    lat: f64,
    #[serde(rename = "Lon")]
    lon: f64,
    #[serde(rename = "Spd")]
    spd: f64,
}

#[derive(Debug, Default, Deserialize)]
struct AccelEnvelope {
    #[serde(rename = "ACCEL", default)]
    accel: AccelFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AccelFields {
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
    #[serde(rename = "Z")]
    z: f64,
}

/// Extracts the vehicle id from the second topic segment.
pub fn vehicle_id_from_topic(topic: &str) -> Result<String> {
    let segment = topic
        .split('/')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| IngestError::MalformedTopic(format!("no vehicle id in '{topic}'")))?;

    segment
        .parse::<i64>()
        .map_err(|_| IngestError::MalformedTopic(format!("vehicle id '{segment}' is not an integer")))?;

    Ok(segment.to_string())
}

pub fn decode(topic: &str, payload: &[u8]) -> Result<Telemetry> {
    let channel = Channel::from_topic(topic)
        .ok_or_else(|| IngestError::MalformedTopic(format!("unknown channel in '{topic}'")))?;
    let vehicle_id = vehicle_id_from_topic(topic)?;

    let reading = match channel {
        Channel::Power => {
            let PowerEnvelope { psu } = serde_json::from_slice(payload)?;
            Reading::Power(PowerReading {
                output_voltage: psu.uop / 100.0,
                output_current: psu.iop / 100.0,
                output_power: psu.pop / 100.0,
                input_voltage: psu.uip / 100.0,
                energy_wh: psu.wh,
            })
        }
        Channel::Position => {
            let PositionEnvelope { gps } = serde_json::from_slice(payload)?;
            Reading::Position(PositionReading {
                lat: gps.lat,
                lon: gps.lon,
                speed: gps.spd,
            })
        }
        Channel::Acceleration => {
            let AccelEnvelope { accel } = serde_json::from_slice(payload)?;
            Reading::Acceleration(AccelerationReading {
                x: accel.x,
                y: accel.y,
                z: accel.z,
            })
        }
        Channel::Suspension => Reading::Suspension(decode_suspension(payload)?),
    };

    Ok(Telemetry { vehicle_id, reading })
}

fn decode_suspension(payload: &[u8]) -> Result<SuspensionEvent> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| IngestError::MalformedPayload("suspension event is not UTF-8".to_string()))?
        .trim();
    let malformed = || IngestError::MalformedPayload(format!("unrecognized suspension event '{text}'"));

    if let Some(value) = text.strip_prefix("SPD:") {
        let speed = value.trim().parse::<f64>().map_err(|_| malformed())?;
        return Ok(SuspensionEvent::Speed(speed));
    }
    if let Some(value) = text.strip_prefix("RST:") {
        let code = value.trim().parse::<i64>().map_err(|_| malformed())?;
        return Ok(SuspensionEvent::Reset(code));
    }
    Err(malformed())
}
