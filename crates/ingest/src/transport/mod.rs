pub mod mqtt;

pub use mqtt::{MqttSettings, MqttTransport};

use crate::decoder::Channel;

/// Subscription filters for every telemetry channel.
pub fn telemetry_filters() -> Vec<String> {
    Channel::ALL.iter().map(Channel::filter).collect()
}
