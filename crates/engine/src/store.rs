//! Race State Store: the authoritative registry of vehicles, races and
//! per-vehicle race metrics.
//!
//! Every operation runs under one store-wide lock, so telemetry ingestion and
//! control-plane requests observe and mutate a consistent registry. Methods
//! with an `_at` suffix take the clock reading explicitly.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::PowerCommand;
use crate::dto::points::PointsRequest;
use crate::dto::race::{RaceRequest, RaceResult};
use crate::error::{EngineError, Result};
use crate::leaderboard::{self, Leaderboards};
use crate::models::{
    ALL_GROUP, LeaderboardEntry, Race, RaceKey, RaceMetrics, Settings, Vehicle,
};
use crate::snapshot::Snapshot;

/// A power command addressed to one vehicle.
pub type Setpoint = (String, PowerCommand);

#[derive(Debug, Clone, Default)]
pub struct RosterChange {
    /// The roster after the update.
    pub vehicles: Vec<Vehicle>,
    pub removed: Vec<String>,
    pub setpoints: Vec<Setpoint>,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleChange {
    pub created: Vec<RaceKey>,
    pub removed: Vec<RaceKey>,
    /// Vehicles whose assignment pointed at a removed race.
    pub released: Vec<String>,
}

#[derive(Debug)]
struct Registry {
    instance_id: Uuid,
    last_save: Option<DateTime<Utc>>,
    settings: Settings,
    vehicles: BTreeMap<String, Vehicle>,
    races: BTreeMap<RaceKey, Race>,
    leaderboards: Leaderboards,
}

impl Registry {
    fn new(instance_id: Uuid) -> Self {
        Self {
            instance_id,
            last_save: None,
            settings: Settings::default(),
            vehicles: BTreeMap::new(),
            races: BTreeMap::new(),
            leaderboards: Leaderboards::new(),
        }
    }

    /// Recomputes max current for every vehicle and returns the set-points.
    fn setpoints(&mut self, announce_skips: bool) -> Vec<Setpoint> {
        let coefficient = self.settings.race_coefficient;
        let mut setpoints = Vec::with_capacity(self.vehicles.len());

        for vehicle in self.vehicles.values_mut() {
            match vehicle.max_current_for(coefficient) {
                Some(current) => {
                    vehicle.max_current = current;
                    setpoints.push((vehicle.vehicle_id.clone(), PowerCommand::setpoint(vehicle)));
                }
                None if announce_skips => warn!(
                    vehicle_id = %vehicle.vehicle_id,
                    target_voltage = vehicle.target_voltage,
                    "Target voltage is not positive, skipping max current"
                ),
                None => {}
            }
        }

        setpoints
    }

    fn active_metrics_mut(&mut self, vehicle_id: &str) -> Result<&mut RaceMetrics> {
        let vehicle = self
            .vehicles
            .get(vehicle_id)
            .ok_or_else(|| EngineError::vehicle_not_found(vehicle_id))?;
        let key = vehicle.current_race.clone().ok_or_else(|| {
            EngineError::InvalidState(format!("vehicle '{vehicle_id}' has no active race"))
        })?;

        self.races
            .get_mut(&key)
            .and_then(|race| race.metrics.get_mut(vehicle_id))
            .ok_or_else(|| EngineError::race_not_found(&key))
    }

    fn recompute(&mut self) -> Vec<LeaderboardEntry> {
        self.leaderboards = leaderboard::recompute(&self.vehicles, &self.races, &self.leaderboards);
        self.leaderboards
            .get(ALL_GROUP)
            .cloned()
            .unwrap_or_default()
    }
}

pub struct RaceStore {
    registry: Mutex<Registry>,
}

impl Default for RaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceStore {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::new(Uuid::new_v4())),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.registry.lock().instance_id
    }

    pub fn settings(&self) -> Settings {
        self.registry.lock().settings
    }

    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.registry.lock().vehicles.values().cloned().collect()
    }

    pub fn vehicle(&self, vehicle_id: &str) -> Option<Vehicle> {
        self.registry.lock().vehicles.get(vehicle_id).cloned()
    }

    pub fn current_race(&self, vehicle_id: &str) -> Option<RaceKey> {
        self.registry
            .lock()
            .vehicles
            .get(vehicle_id)
            .and_then(|v| v.current_race.clone())
    }

    pub fn races(&self) -> Vec<Race> {
        self.registry.lock().races.values().cloned().collect()
    }

    pub fn race(&self, key: &RaceKey) -> Option<Race> {
        self.registry.lock().races.get(key).cloned()
    }

    /// Replaces the roster.
    ///
    /// Listed vehicles are upserted, keeping any in-progress assignment; the
    /// rest are removed. Max currents are recomputed and returned as set-points.
    pub fn set_roster(&self, roster: Vec<Vehicle>) -> RosterChange {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;

        let listed: BTreeMap<String, Vehicle> = roster
            .into_iter()
            .map(|vehicle| (vehicle.vehicle_id.clone(), vehicle))
            .collect();

        let removed: Vec<String> = registry
            .vehicles
            .keys()
            .filter(|id| !listed.contains_key(*id))
            .cloned()
            .collect();
        let now = Utc::now();
        for vehicle_id in &removed {
            let race = registry
                .vehicles
                .remove(vehicle_id)
                .and_then(|vehicle| vehicle.current_race);
            if let Some(metrics) = race
                .as_ref()
                .and_then(|key| registry.races.get_mut(key))
                .and_then(|race| race.metrics.get_mut(vehicle_id))
            {
                metrics.settle(now);
                metrics.finish(now);
            }
        }

        for (vehicle_id, mut vehicle) in listed {
            vehicle.current_race = registry
                .vehicles
                .get(&vehicle_id)
                .and_then(|existing| existing.current_race.clone());
            registry.vehicles.insert(vehicle_id, vehicle);
        }

        let setpoints = registry.setpoints(true);
        info!(
            vehicles = registry.vehicles.len(),
            removed = removed.len(),
            "Roster replaced"
        );

        RosterChange {
            vehicles: registry.vehicles.values().cloned().collect(),
            removed,
            setpoints,
        }
    }

    /// Replaces the schedule, keyed by `(race_name, lap)`.
    ///
    /// Existing races keep their metrics. Vehicles assigned to a removed race
    /// are released.
    pub fn set_schedule(&self, schedule: Vec<RaceRequest>) -> ScheduleChange {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;

        let listed: BTreeMap<RaceKey, f64> = schedule
            .into_iter()
            .map(|race| (race.key(), race.length))
            .collect();

        let removed: Vec<RaceKey> = registry
            .races
            .keys()
            .filter(|key| !listed.contains_key(*key))
            .cloned()
            .collect();
        for key in &removed {
            registry.races.remove(key);
        }

        let mut released = Vec::new();
        for vehicle in registry.vehicles.values_mut() {
            if vehicle
                .current_race
                .as_ref()
                .is_some_and(|key| removed.contains(key))
            {
                vehicle.current_race = None;
                released.push(vehicle.vehicle_id.clone());
            }
        }

        let mut created = Vec::new();
        for (key, length) in listed {
            match registry.races.get_mut(&key) {
                Some(race) => race.length = length,
                None => {
                    created.push(key.clone());
                    registry.races.insert(key.clone(), Race::new(key, length));
                }
            }
        }

        info!(
            races = registry.races.len(),
            created = created.len(),
            removed = removed.len(),
            "Schedule replaced"
        );
        if !released.is_empty() {
            warn!(vehicles = ?released, "Released vehicles from removed races");
        }

        ScheduleChange {
            created,
            removed,
            released,
        }
    }

    pub fn start_race(&self, vehicle_id: &str, key: &RaceKey) -> Result<()> {
        self.start_race_at(vehicle_id, key, Utc::now())
    }

    /// Assigns the vehicle to the race and starts timing it with fresh metrics.
    pub fn start_race_at(&self, vehicle_id: &str, key: &RaceKey, now: DateTime<Utc>) -> Result<()> {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;

        let vehicle = registry
            .vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| EngineError::vehicle_not_found(vehicle_id))?;
        let race = registry
            .races
            .get_mut(key)
            .ok_or_else(|| EngineError::race_not_found(key))?;

        if let Some(current) = &vehicle.current_race {
            return Err(EngineError::InvalidState(format!(
                "vehicle '{vehicle_id}' is already racing in '{current}'"
            )));
        }

        race.metrics
            .insert(vehicle_id.to_string(), RaceMetrics::started(now));
        vehicle.current_race = Some(key.clone());

        info!(vehicle_id, race = %key, "Race started");
        Ok(())
    }

    pub fn finish_vehicle(&self, vehicle_id: &str) -> Result<RaceKey> {
        self.finish_vehicle_at(vehicle_id, Utc::now())
    }

    /// Stops timing the vehicle and clears its assignment.
    pub fn finish_vehicle_at(&self, vehicle_id: &str, now: DateTime<Utc>) -> Result<RaceKey> {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;

        let vehicle = registry
            .vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| EngineError::vehicle_not_found(vehicle_id))?;
        let key = vehicle.current_race.take().ok_or_else(|| {
            EngineError::InvalidState(format!("vehicle '{vehicle_id}' is not racing"))
        })?;

        if let Some(metrics) = registry
            .races
            .get_mut(&key)
            .and_then(|race| race.metrics.get_mut(vehicle_id))
        {
            metrics.settle(now);
            metrics.finish(now);
        }

        info!(vehicle_id, race = %key, "Vehicle finished");
        Ok(key)
    }

    pub fn finish_race(&self, key: &RaceKey) -> Result<Vec<String>> {
        self.finish_race_at(key, Utc::now())
    }

    /// Finishes every vehicle currently assigned to exactly this race.
    pub fn finish_race_at(&self, key: &RaceKey, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;

        let race = registry
            .races
            .get_mut(key)
            .ok_or_else(|| EngineError::race_not_found(key))?;

        let mut finished = Vec::new();
        for vehicle in registry.vehicles.values_mut() {
            if vehicle.current_race.as_ref() != Some(key) {
                continue;
            }
            vehicle.current_race = None;
            if let Some(metrics) = race.metrics.get_mut(&vehicle.vehicle_id) {
                metrics.settle(now);
                metrics.finish(now);
            }
            finished.push(vehicle.vehicle_id.clone());
        }

        info!(race = %key, vehicles = finished.len(), "Race finished");
        Ok(finished)
    }

    pub fn on_telemetry_tick(&self, vehicle_id: &str) -> Result<Duration> {
        self.on_telemetry_tick_at(vehicle_id, Utc::now())
    }

    /// Settles the vehicle's race time up to `now` and returns the credited time.
    pub fn on_telemetry_tick_at(&self, vehicle_id: &str, now: DateTime<Utc>) -> Result<Duration> {
        let mut registry = self.registry.lock();
        let metrics = registry.active_metrics_mut(vehicle_id)?;
        Ok(metrics.settle(now))
    }

    pub fn on_power_sample(&self, vehicle_id: &str, watts: f64) -> Result<f64> {
        self.on_power_sample_at(vehicle_id, watts, Utc::now())
    }

    /// Settles time, then credits `watts` over the settled interval.
    ///
    /// Returns the vehicle's total energy in the race (Wh).
    pub fn on_power_sample_at(&self, vehicle_id: &str, watts: f64, now: DateTime<Utc>) -> Result<f64> {
        let mut registry = self.registry.lock();
        let metrics = registry.active_metrics_mut(vehicle_id)?;
        let credited = metrics.settle(now);
        let total = metrics.add_energy(watts, credited);
        debug!(vehicle_id, watts, ?credited, total_wh = total, "Power sample settled");
        Ok(total)
    }

    /// Efficiency figures for every rostered vehicle with metrics in the
    /// named race, across all laps unless `lap` is given.
    pub fn compute_results(&self, race_name: &str, lap: Option<u32>) -> Result<Vec<RaceResult>> {
        let registry = self.registry.lock();

        let races: Vec<&Race> = registry
            .races
            .values()
            .filter(|race| race.race_name == race_name && lap.is_none_or(|l| race.lap == l))
            .collect();
        if races.is_empty() {
            return Err(match lap {
                Some(lap) => EngineError::race_not_found(RaceKey::new(race_name, lap)),
                None => EngineError::race_not_found(race_name),
            });
        }

        let vehicles = &registry.vehicles;
        let results = races
            .into_iter()
            .flat_map(|race| {
                race.metrics.iter().filter_map(move |(vehicle_id, metrics)| {
                    vehicles
                        .get(vehicle_id)
                        .map(|vehicle| race_result(race, vehicle, metrics))
                })
            })
            .collect();

        Ok(results)
    }

    /// Sets points on every race named after the category, creating a
    /// points-only race when none exists. Returns the new overall standings.
    pub fn update_points(&self, request: &PointsRequest) -> Vec<LeaderboardEntry> {
        let mut registry = self.registry.lock();
        let category = request.category_name.as_str();

        let mut matched = false;
        for race in registry
            .races
            .values_mut()
            .filter(|race| race.race_name == category)
        {
            matched = true;
            for entry in &request.points {
                race.metrics
                    .entry(entry.vehicle_id.clone())
                    .or_default()
                    .points = entry.points;
            }
        }

        if !matched {
            let key = RaceKey::new(category, 0);
            let mut race = Race::new(key.clone(), 0.0);
            for entry in &request.points {
                race.metrics
                    .insert(entry.vehicle_id.clone(), RaceMetrics::with_points(entry.points));
            }
            registry.races.insert(key, race);
            info!(category, "Created points-only race");
        }

        registry.recompute()
    }

    pub fn reset_points(&self, category: &str) -> Result<Vec<LeaderboardEntry>> {
        let mut registry = self.registry.lock();

        let mut matched = false;
        for race in registry
            .races
            .values_mut()
            .filter(|race| race.race_name == category)
        {
            matched = true;
            for metrics in race.metrics.values_mut() {
                metrics.points = 0;
            }
        }
        if !matched {
            return Err(EngineError::NotFound(format!("category '{category}' not found")));
        }

        Ok(registry.recompute())
    }

    pub fn leaderboard(&self, group: &str) -> Result<Vec<LeaderboardEntry>> {
        self.registry
            .lock()
            .leaderboards
            .get(group)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("leaderboard '{group}' not found")))
    }

    /// Zeroes the rank deltas of a stored leaderboard.
    pub fn reset_leaderboard(&self, group: &str) -> Result<()> {
        let mut registry = self.registry.lock();
        let board = registry
            .leaderboards
            .get_mut(group)
            .ok_or_else(|| EngineError::NotFound(format!("leaderboard '{group}' not found")))?;
        for entry in board.iter_mut() {
            entry.rank_delta = 0;
        }
        Ok(())
    }

    /// Stores new settings and returns the recomputed set-points.
    pub fn update_settings(&self, settings: Settings) -> Vec<Setpoint> {
        let mut registry = self.registry.lock();
        registry.settings = settings;
        info!(
            race_coefficient = settings.race_coefficient,
            max_speed = settings.max_speed,
            "Settings updated"
        );
        registry.setpoints(true)
    }

    /// Set-points for the periodic refresh.
    pub fn setpoints(&self) -> Vec<Setpoint> {
        self.registry.lock().setpoints(false)
    }

    pub fn snapshot(&self) -> Snapshot {
        let registry = self.registry.lock();
        Snapshot {
            instance_id: Some(registry.instance_id),
            last_save: registry.last_save,
            settings: registry.settings,
            vehicles: registry.vehicles.values().cloned().collect(),
            races: registry.races.values().cloned().collect(),
            leaderboards: registry.leaderboards.clone(),
        }
    }

    pub fn mark_saved(&self, at: DateTime<Utc>) {
        self.registry.lock().last_save = Some(at);
    }

    /// Replaces the whole registry with a loaded snapshot.
    ///
    /// A snapshot without an instance id gets a fresh one.
    pub fn restore(&self, snapshot: Snapshot) -> Uuid {
        let instance_id = snapshot.instance_id.unwrap_or_else(|| {
            let id = Uuid::new_v4();
            info!(instance_id = %id, "Snapshot has no instance id, generated a new one");
            id
        });

        let mut registry = Registry::new(instance_id);
        registry.last_save = snapshot.last_save;
        registry.settings = snapshot.settings;
        registry.vehicles = snapshot
            .vehicles
            .into_iter()
            .map(|vehicle| (vehicle.vehicle_id.clone(), vehicle))
            .collect();
        registry.races = snapshot
            .races
            .into_iter()
            .map(|race| (race.key(), race))
            .collect();
        registry.leaderboards = snapshot.leaderboards;

        *self.registry.lock() = registry;
        instance_id
    }

    /// Clears vehicles, races and leaderboards under a new instance id.
    ///
    /// The race coefficient is zeroed; the speed limit is kept.
    pub fn reset(&self) -> Uuid {
        let mut registry = self.registry.lock();
        let mut settings = registry.settings;
        settings.race_coefficient = 0.0;

        *registry = Registry::new(Uuid::new_v4());
        registry.settings = settings;
        info!(instance_id = %registry.instance_id, "Race data reset");
        registry.instance_id
    }
}

fn race_result(race: &Race, vehicle: &Vehicle, metrics: &RaceMetrics) -> RaceResult {
    let length_km = race.length_km();
    let hours = metrics.race_time.as_secs_f64() / 3600.0;
    let energy = metrics.energy_wh;

    let mut result = RaceResult {
        race_name: race.race_name.clone(),
        lap: race.lap,
        vehicle_id: vehicle.vehicle_id.clone(),
        username: vehicle.username.clone(),
        avatar: vehicle.avatar.clone(),
        used_energy: energy,
        efficiency: 0.0,
        distance_efficiency: 0.0,
        average_power: 0.0,
        average_speed: 0.0,
        elapsed_time: metrics.race_time.as_secs_f64(),
        finished: metrics.is_finished(),
    };

    if length_km > 0.0 && hours > 0.0 {
        if vehicle.mass > 0.0 {
            result.efficiency = energy / length_km / vehicle.mass;
        }
        if energy > 0.0 {
            result.distance_efficiency = length_km / (energy / 1000.0);
        }
        result.average_power = energy / hours;
        result.average_speed = length_km / hours;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::points::PointsEntry;
    use crate::models::RacePhase;
    use chrono::TimeDelta;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn vehicle(id: &str, category: &str) -> Vehicle {
        Vehicle {
            vehicle_id: id.to_string(),
            username: format!("driver-{id}"),
            avatar: String::new(),
            target_voltage: 50.0,
            max_current: 0.0,
            mass: 100.0,
            category: category.to_string(),
            current_race: None,
        }
    }

    fn race_request(name: &str, lap: u32, length: f64) -> RaceRequest {
        RaceRequest {
            race_name: name.to_string(),
            lap,
            length,
        }
    }

    fn store_with(vehicles: &[&str], races: &[(&str, u32, f64)]) -> RaceStore {
        let store = RaceStore::new();
        store.set_roster(vehicles.iter().map(|id| vehicle(id, "open")).collect());
        store.set_schedule(
            races
                .iter()
                .map(|(name, lap, length)| race_request(name, *lap, *length))
                .collect(),
        );
        store
    }

    fn metrics(store: &RaceStore, key: &RaceKey, vehicle_id: &str) -> RaceMetrics {
        store.race(key).unwrap().metrics[vehicle_id].clone()
    }

    #[test]
    fn test_start_then_finish_freezes_metrics() {
        let store = store_with(&["1"], &[("sprint", 1, 1000.0)]);
        let key = RaceKey::new("sprint", 1);

        store.start_race_at("1", &key, at(0)).unwrap();
        store.finish_vehicle_at("1", at(0)).unwrap();

        let m = metrics(&store, &key, "1");
        assert_eq!(m.phase, RacePhase::Finished);
        assert!(!m.is_active());
        assert_eq!(m.race_time, Duration::ZERO);
        assert!(store.current_race("1").is_none());
    }

    #[test]
    fn test_start_unknown_vehicle_or_race_is_not_found() {
        let store = store_with(&["1"], &[("sprint", 1, 1000.0)]);

        let err = store.start_race("9", &RaceKey::new("sprint", 1)).unwrap_err();
        assert!(err.is_not_found());
        let err = store.start_race("1", &RaceKey::new("sprint", 2)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_start_while_racing_is_rejected_without_side_effects() {
        let store = store_with(&["1"], &[("sprint", 1, 1000.0), ("sprint", 2, 1000.0)]);
        let first = RaceKey::new("sprint", 1);
        store.start_race_at("1", &first, at(0)).unwrap();
        store.on_power_sample_at("1", 100.0, at(36)).unwrap();
        let before = metrics(&store, &first, "1");

        let err = store.start_race_at("1", &RaceKey::new("sprint", 2), at(40)).unwrap_err();

        assert!(err.is_invalid_state());
        assert_eq!(metrics(&store, &first, "1"), before);
        assert!(!store.race(&RaceKey::new("sprint", 2)).unwrap().metrics.contains_key("1"));
        assert_eq!(store.current_race("1"), Some(first));
    }

    #[test]
    fn test_finish_without_race_is_invalid_state() {
        let store = store_with(&["1"], &[]);
        assert!(store.finish_vehicle("1").unwrap_err().is_invalid_state());
        assert!(store.finish_vehicle("2").unwrap_err().is_not_found());
    }

    #[test]
    fn test_finish_race_stops_only_assigned_vehicles() {
        let store = store_with(&["1", "2", "3"], &[("sprint", 1, 1000.0), ("sprint", 2, 1000.0)]);
        let first = RaceKey::new("sprint", 1);
        let second = RaceKey::new("sprint", 2);
        store.start_race_at("1", &first, at(0)).unwrap();
        store.start_race_at("2", &first, at(0)).unwrap();
        store.start_race_at("3", &second, at(0)).unwrap();

        let finished = store.finish_race_at(&first, at(60)).unwrap();

        assert_eq!(finished, vec!["1", "2"]);
        assert_eq!(metrics(&store, &first, "1").wall_time, Duration::from_secs(60));
        assert_eq!(store.current_race("3"), Some(second));
        assert!(store.finish_race(&RaceKey::new("final", 0)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_tick_without_active_race_fails() {
        let store = store_with(&["1"], &[]);
        assert!(store.on_telemetry_tick("1").unwrap_err().is_invalid_state());
        assert!(store.on_telemetry_tick("7").unwrap_err().is_not_found());
    }

    #[test]
    fn test_energy_is_independent_of_sample_granularity() {
        let store = store_with(&["1", "2"], &[("sprint", 1, 1000.0)]);
        let key = RaceKey::new("sprint", 1);
        store.start_race_at("1", &key, at(0)).unwrap();
        store.start_race_at("2", &key, at(0)).unwrap();

        let coarse = store.on_power_sample_at("1", 250.0, at(600)).unwrap();
        let mut fine = 0.0;
        for step in 1..=600 {
            fine = store.on_power_sample_at("2", 250.0, at(step)).unwrap();
        }

        assert!((coarse - fine).abs() < 1e-9);
        assert!((coarse - 250.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_energy_never_decreases_and_ignores_out_of_order_ticks() {
        let store = store_with(&["1"], &[("sprint", 1, 1000.0)]);
        let key = RaceKey::new("sprint", 1);
        store.start_race_at("1", &key, at(0)).unwrap();

        let a = store.on_power_sample_at("1", 100.0, at(10)).unwrap();
        let b = store.on_power_sample_at("1", 100.0, at(4)).unwrap();
        let c = store.on_power_sample_at("1", 100.0, at(20)).unwrap();

        assert!(b >= a);
        assert!(c >= b);
        assert_eq!(metrics(&store, &key, "1").race_time, Duration::from_secs(20));
    }

    #[test]
    fn test_ticks_after_finish_credit_nothing() {
        let store = store_with(&["1"], &[("sprint", 1, 1000.0)]);
        let key = RaceKey::new("sprint", 1);
        store.start_race_at("1", &key, at(0)).unwrap();
        store.on_power_sample_at("1", 100.0, at(10)).unwrap();
        store.finish_vehicle_at("1", at(10)).unwrap();

        assert!(store.on_power_sample_at("1", 100.0, at(30)).is_err());
        assert_eq!(metrics(&store, &key, "1").race_time, Duration::from_secs(10));
    }

    #[test]
    fn test_roster_replacement_keeps_assignment() {
        let store = store_with(&["A", "B"], &[("sprint", 1, 1000.0)]);
        let key = RaceKey::new("sprint", 1);
        store.start_race_at("A", &key, at(0)).unwrap();

        let change = store.set_roster(vec![vehicle("A", "open"), vehicle("C", "open")]);

        assert_eq!(change.removed, vec!["B"]);
        assert!(store.vehicle("B").is_none());
        assert_eq!(store.current_race("A"), Some(key));
        let c = store.vehicle("C").unwrap();
        assert!(c.current_race.is_none());
        assert_eq!(change.vehicles.len(), 2);
    }

    #[test]
    fn test_removing_a_racing_vehicle_freezes_its_metrics() {
        let store = store_with(&["A", "B"], &[("sprint", 1, 1000.0)]);
        let key = RaceKey::new("sprint", 1);
        store.start_race_at("B", &key, at(0)).unwrap();

        store.set_roster(vec![vehicle("A", "open")]);

        let m = metrics(&store, &key, "B");
        assert_eq!(m.phase, RacePhase::Finished);
        assert!(!m.is_active());
    }

    #[test]
    fn test_restart_begins_with_fresh_metrics() {
        let store = store_with(&["1"], &[("sprint", 1, 1000.0)]);
        let key = RaceKey::new("sprint", 1);
        store.start_race_at("1", &key, at(0)).unwrap();
        store.on_power_sample_at("1", 100.0, at(36)).unwrap();
        store.finish_vehicle_at("1", at(40)).unwrap();
        store.update_points(&PointsRequest {
            category_name: "sprint".to_string(),
            points: vec![PointsEntry {
                vehicle_id: "1".to_string(),
                points: 25,
            }],
        });
        assert_eq!(metrics(&store, &key, "1").points, 25);

        store.start_race_at("1", &key, at(60)).unwrap();

        let m = metrics(&store, &key, "1");
        assert_eq!(m.points, 0);
        assert_eq!(m.energy_wh, 0.0);
        assert_eq!(m.race_time, Duration::ZERO);
        assert_eq!(m.phase, RacePhase::Racing);
    }

    #[test]
    fn test_roster_setpoints_skip_non_positive_voltage() {
        let store = RaceStore::new();
        store.update_settings(Settings {
            race_coefficient: 2.0,
            max_speed: 0.0,
        });
        let mut dead = vehicle("2", "open");
        dead.target_voltage = 0.0;

        let change = store.set_roster(vec![vehicle("1", "open"), dead]);

        assert_eq!(change.setpoints.len(), 1);
        let (id, command) = &change.setpoints[0];
        assert_eq!(id, "1");
        assert!((command.current - 4.0).abs() < 1e-9);
        assert!((store.vehicle("1").unwrap().max_current - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_schedule_replacement_releases_removed_races() {
        let store = store_with(&["1"], &[("sprint", 1, 1000.0), ("sprint", 2, 1000.0)]);
        let first = RaceKey::new("sprint", 1);
        store.start_race_at("1", &first, at(0)).unwrap();

        let change = store.set_schedule(vec![race_request("sprint", 2, 1500.0)]);

        assert_eq!(change.removed, vec![first]);
        assert_eq!(change.released, vec!["1"]);
        assert!(store.current_race("1").is_none());
        assert_eq!(store.race(&RaceKey::new("sprint", 2)).unwrap().length, 1500.0);
    }

    #[test]
    fn test_results_formulas() {
        let store = store_with(&["1"], &[("sprint", 1, 2000.0)]);
        let key = RaceKey::new("sprint", 1);
        store.start_race_at("1", &key, at(0)).unwrap();
        store
            .on_power_sample_at("1", 200.0, at(0) + TimeDelta::minutes(30))
            .unwrap();

        let results = store.compute_results("sprint", None).unwrap();
        let r = &results[0];

        assert!((r.used_energy - 100.0).abs() < 1e-9);
        assert!((r.efficiency - 100.0 / 2.0 / 100.0).abs() < 1e-9);
        assert!((r.distance_efficiency - 2.0 / 0.1).abs() < 1e-9);
        assert!((r.average_power - 200.0).abs() < 1e-9);
        assert!((r.average_speed - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_results_guard_zero_length_and_time() {
        let store = store_with(&["1"], &[("sprint", 1, 0.0)]);
        store.start_race_at("1", &RaceKey::new("sprint", 1), at(0)).unwrap();

        let results = store.compute_results("sprint", Some(1)).unwrap();

        assert_eq!(results[0].efficiency, 0.0);
        assert_eq!(results[0].average_speed, 0.0);
        assert!(store.compute_results("sprint", Some(4)).unwrap_err().is_not_found());
        assert!(store.compute_results("final", None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_points_create_race_and_rank() {
        let store = store_with(&["1", "2"], &[]);
        let standings = store.update_points(&PointsRequest {
            category_name: "bonus".to_string(),
            points: vec![
                PointsEntry {
                    vehicle_id: "1".to_string(),
                    points: 3,
                },
                PointsEntry {
                    vehicle_id: "2".to_string(),
                    points: 8,
                },
            ],
        });

        assert_eq!(standings[0].vehicle_id, "2");
        assert!(store.race(&RaceKey::new("bonus", 0)).is_some());
        assert_eq!(store.leaderboard("open").unwrap().len(), 2);

        let standings = store.reset_points("bonus").unwrap();
        assert!(standings.iter().all(|e| e.total_points() == 0));
        assert!(store.reset_points("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_reset_leaderboard_zeroes_deltas() {
        let store = store_with(&["1", "2"], &[]);
        let entry = |id: &str, points| PointsEntry {
            vehicle_id: id.to_string(),
            points,
        };
        store.update_points(&PointsRequest {
            category_name: "bonus".to_string(),
            points: vec![entry("1", 5), entry("2", 1)],
        });
        store.update_points(&PointsRequest {
            category_name: "bonus".to_string(),
            points: vec![entry("1", 1), entry("2", 5)],
        });
        assert_eq!(store.leaderboard("all").unwrap()[0].rank_delta, 1);

        store.reset_leaderboard("all").unwrap();

        assert!(store.leaderboard("all").unwrap().iter().all(|e| e.rank_delta == 0));
        assert!(store.reset_leaderboard("juniors").unwrap_err().is_not_found());
    }

    #[test]
    fn test_snapshot_restore_and_reset() {
        let store = store_with(&["1"], &[("sprint", 1, 1000.0)]);
        store.update_settings(Settings {
            race_coefficient: 1.5,
            max_speed: 30.0,
        });
        let snapshot = store.snapshot();

        let other = RaceStore::new();
        let id = other.restore(snapshot.clone());
        assert_eq!(Some(id), snapshot.instance_id);
        assert_eq!(other.vehicles().len(), 1);
        assert_eq!(other.races().len(), 1);

        let fresh = other.reset();
        assert_ne!(fresh, id);
        assert!(other.vehicles().is_empty());
        assert_eq!(other.settings().race_coefficient, 0.0);
        assert_eq!(other.settings().max_speed, 30.0);
    }

    #[test]
    fn test_restore_without_instance_id_generates_one() {
        let store = RaceStore::new();
        let id = store.restore(Snapshot::default());
        assert!(!id.is_nil());
        assert_eq!(store.instance_id(), id);
    }
}
