//! Debounced speed governor.
//!
//! Each vehicle carries a small counter. Six consecutive over-limit samples
//! cut the vehicle's power; the two samples after the cut are a hold period,
//! and the sample that finds the counter at the end of the hold restores power
//! and re-arms the governor.

use parking_lot::Mutex;
use std::collections::HashMap;

const CUTOFF_AT: u8 = 6;
const RESTORE_AT: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorAction {
    None,
    Cut,
    Restore,
}

#[derive(Debug, Default)]
pub struct SpeedGovernor {
    counters: Mutex<HashMap<String, u8>>,
}

impl SpeedGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one speed sample. `max_speed <= 0` never counts a violation.
    pub fn sample(&self, vehicle_id: &str, speed: f64, max_speed: f64) -> GovernorAction {
        let mut counters = self.counters.lock();
        let counter = counters.entry(vehicle_id.to_string()).or_insert(0);

        if *counter >= RESTORE_AT {
            *counter = 0;
            return GovernorAction::Restore;
        }
        if *counter > CUTOFF_AT {
            *counter += 1;
            return GovernorAction::None;
        }

        if max_speed > 0.0 && speed > max_speed {
            *counter += 1;
        }
        if *counter == CUTOFF_AT {
            *counter += 1;
            return GovernorAction::Cut;
        }
        GovernorAction::None
    }

    /// Whether the vehicle's power is currently held off.
    pub fn is_cut(&self, vehicle_id: &str) -> bool {
        self.counters
            .lock()
            .get(vehicle_id)
            .is_some_and(|c| *c > CUTOFF_AT)
    }

    pub fn counter(&self, vehicle_id: &str) -> u8 {
        self.counters.lock().get(vehicle_id).copied().unwrap_or(0)
    }

    pub fn forget(&self, vehicle_id: &str) {
        self.counters.lock().remove(vehicle_id);
    }

    pub fn clear(&self) {
        self.counters.lock().clear();
    }
}
