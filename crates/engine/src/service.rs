//! The race service context.
//!
//! `RaceService` is constructed once at startup and shared by the ingestion
//! pipeline, the HTTP handlers and the background loops. It owns the store,
//! the live hub, the governor and the activity clock, and coordinates the
//! outbound commands that follow state changes.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::activity::ActivityClock;
use crate::command::{CommandPublisher, PowerCommand, PowerStatus};
use crate::dto::points::PointsRequest;
use crate::dto::race::{RaceRequest, StartRaceOutcome, StartRaceRequest};
use crate::error::{EngineError, Result};
use crate::governor::{GovernorAction, SpeedGovernor};
use crate::live::LiveDataHub;
use crate::models::{
    ALL_GROUP, AccelerationReading, LeaderboardEntry, PositionReading, PowerReading, RaceKey,
    Settings, SuspensionEvent, Vehicle,
};
use crate::snapshot::SnapshotStore;
use crate::store::{RaceStore, RosterChange, ScheduleChange};

pub struct RaceService {
    store: RaceStore,
    hub: LiveDataHub,
    governor: SpeedGovernor,
    activity: ActivityClock,
    publisher: Arc<dyn CommandPublisher>,
    snapshots: SnapshotStore,
}

impl RaceService {
    pub fn new(
        publisher: Arc<dyn CommandPublisher>,
        snapshots: SnapshotStore,
        session_queue_capacity: usize,
    ) -> Self {
        Self {
            store: RaceStore::new(),
            hub: LiveDataHub::new(session_queue_capacity),
            governor: SpeedGovernor::new(),
            activity: ActivityClock::new(),
            publisher,
            snapshots,
        }
    }

    pub fn store(&self) -> &RaceStore {
        &self.store
    }

    pub fn hub(&self) -> &LiveDataHub {
        &self.hub
    }

    pub fn governor(&self) -> &SpeedGovernor {
        &self.governor
    }

    pub fn activity(&self) -> &ActivityClock {
        &self.activity
    }

    /// Replaces the roster, refreshes live identities and publishes set-points.
    pub async fn set_roster(&self, roster: Vec<Vehicle>) -> RosterChange {
        let change = self.store.set_roster(roster);

        for vehicle_id in &change.removed {
            self.hub.remove(vehicle_id);
            self.governor.forget(vehicle_id);
        }
        for vehicle in &change.vehicles {
            self.hub
                .register_or_refresh(&vehicle.vehicle_id, &vehicle.username, &vehicle.avatar);
        }

        for (vehicle_id, command) in &change.setpoints {
            if let Err(e) = self.send_command(vehicle_id, command).await {
                warn!(vehicle_id = %vehicle_id, error = %e, "Failed to publish set-point");
            }
        }

        change
    }

    pub fn set_schedule(&self, schedule: Vec<RaceRequest>) -> ScheduleChange {
        self.store.set_schedule(schedule)
    }

    /// Starts each requested pair independently.
    pub fn start_races(&self, requests: Vec<StartRaceRequest>) -> Vec<StartRaceOutcome> {
        requests
            .into_iter()
            .map(|request| {
                let result = self.store.start_race(&request.vehicle_id, &request.key());
                if let Err(e) = &result {
                    warn!(
                        vehicle_id = %request.vehicle_id,
                        race = %request.key(),
                        error = %e,
                        "Failed to start race"
                    );
                }
                StartRaceOutcome {
                    race_name: request.race_name,
                    lap: request.lap,
                    vehicle_id: request.vehicle_id,
                    started: result.is_ok(),
                    error_kind: result.as_ref().err().map(|e| e.kind().to_string()),
                    error: result.err().map(|e| e.to_string()),
                }
            })
            .collect()
    }

    pub fn finish_vehicle(&self, vehicle_id: &str) -> Result<RaceKey> {
        self.store.finish_vehicle(vehicle_id)
    }

    pub fn finish_race(&self, key: &RaceKey) -> Result<Vec<String>> {
        self.store.finish_race(key)
    }

    pub fn update_points(&self, request: &PointsRequest) -> Vec<LeaderboardEntry> {
        let standings = self.store.update_points(request);
        self.hub.apply_standings(&standings);
        standings
    }

    pub fn reset_points(&self, category: &str) -> Result<Vec<LeaderboardEntry>> {
        let standings = self.store.reset_points(category)?;
        self.hub.apply_standings(&standings);
        Ok(standings)
    }

    /// Stores settings and pushes the recomputed set-points.
    pub async fn update_settings(&self, settings: Settings) -> Settings {
        let setpoints = self.store.update_settings(settings);
        for (vehicle_id, command) in &setpoints {
            if let Err(e) = self.send_command(vehicle_id, command).await {
                warn!(vehicle_id = %vehicle_id, error = %e, "Failed to publish set-point");
            }
        }
        self.store.settings()
    }

    /// Publishes an arbitrary payload on an arbitrary topic.
    pub async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if topic.is_empty() {
            return Err(EngineError::MalformedInput("topic is empty".to_string()));
        }
        self.publisher.publish(topic, payload).await
    }

    async fn send_command(&self, vehicle_id: &str, command: &PowerCommand) -> Result<()> {
        let payload = command.encode()?;
        self.publisher
            .publish(&PowerCommand::topic(vehicle_id), payload)
            .await
    }

    /// Power channel: live power/voltage, then energy settlement.
    pub fn ingest_power(&self, vehicle_id: &str, reading: &PowerReading) -> Result<f64> {
        self.hub
            .update_power(vehicle_id, reading.output_power, reading.output_voltage);
        self.store.on_power_sample(vehicle_id, reading.output_power)
    }

    /// Position channel: live position, governor sample, then time settlement.
    pub async fn ingest_position(&self, vehicle_id: &str, reading: &PositionReading) -> Result<Duration> {
        self.hub
            .update_position(vehicle_id, reading.lat, reading.lon, reading.speed);

        let vehicle = self
            .store
            .vehicle(vehicle_id)
            .ok_or_else(|| EngineError::vehicle_not_found(vehicle_id))?;
        let max_speed = self.store.settings().max_speed;

        let command = match self.governor.sample(vehicle_id, reading.speed, max_speed) {
            GovernorAction::Cut => {
                warn!(vehicle_id, speed = reading.speed, max_speed, "Speed limit exceeded, cutting power");
                Some(PowerCommand::cutoff(&vehicle))
            }
            GovernorAction::Restore => {
                info!(vehicle_id, "Speed hold elapsed, restoring power");
                Some(PowerCommand::setpoint(&vehicle))
            }
            GovernorAction::None => None,
        };
        if let Some(command) = command
            && let Err(e) = self.send_command(vehicle_id, &command).await
        {
            error!(vehicle_id, error = %e, "Failed to publish governor command");
        }

        self.store.on_telemetry_tick(vehicle_id)
    }

    pub fn ingest_acceleration(&self, vehicle_id: &str, reading: &AccelerationReading) -> Result<Duration> {
        self.hub.update_acceleration(vehicle_id, reading.magnitude());
        self.store.on_telemetry_tick(vehicle_id)
    }

    pub fn ingest_suspension(&self, vehicle_id: &str, event: &SuspensionEvent) -> Result<Duration> {
        match event {
            SuspensionEvent::Speed(speed) => debug!(vehicle_id, speed, "Suspension speed event"),
            SuspensionEvent::Reset(code) => info!(vehicle_id, code, "Suspension reset event"),
        }
        self.store.on_telemetry_tick(vehicle_id)
    }

    /// Re-sends every vehicle's set-point; vehicles held in cut-off get zero current.
    pub async fn refresh_setpoints(&self) -> usize {
        let mut sent = 0;
        for (vehicle_id, mut command) in self.store.setpoints() {
            if self.governor.is_cut(&vehicle_id) {
                command.current = 0.0;
                command.status = PowerStatus::Off;
            }
            match self.send_command(&vehicle_id, &command).await {
                Ok(()) => sent += 1,
                Err(e) => debug!(vehicle_id = %vehicle_id, error = %e, "Set-point refresh failed"),
            }
        }
        sent
    }

    pub async fn run_setpoint_refresh(&self, period: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let sent = self.refresh_setpoints().await;
                    debug!(sent, "Set-points refreshed");
                }
            }
        }

        info!("Set-point refresh stopped");
    }

    pub async fn run_autosave(&self, period: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; nothing has changed yet.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.save_snapshot().await {
                        error!(error = %e, "Autosave failed");
                    }
                }
            }
        }
    }

    pub async fn save_snapshot(&self) -> Result<PathBuf> {
        let now = Utc::now();
        let mut snapshot = self.store.snapshot();
        snapshot.last_save = Some(now);

        let path = self.snapshots.save(&snapshot).await?;
        self.store.mark_saved(now);
        Ok(path)
    }

    /// Loads the latest snapshot, if any, and rebuilds the live projection.
    pub async fn load_snapshot(&self) -> Result<bool> {
        let Some(snapshot) = self.snapshots.load().await? else {
            info!(dir = %self.snapshots.dir().display(), "No snapshot found, starting empty");
            return Ok(false);
        };

        let instance_id = self.store.restore(snapshot);
        self.hub.clear();
        for vehicle in self.store.vehicles() {
            self.hub
                .register_or_refresh(&vehicle.vehicle_id, &vehicle.username, &vehicle.avatar);
        }
        if let Ok(standings) = self.store.leaderboard(ALL_GROUP) {
            self.hub.apply_standings(&standings);
        }

        info!(instance_id = %instance_id, "State restored");
        Ok(true)
    }

    /// Saves the current state, then starts over under a new instance id.
    pub async fn reset_data(&self) -> Result<Uuid> {
        self.save_snapshot().await?;
        let instance_id = self.store.reset();
        self.hub.clear();
        self.governor.clear();
        Ok(instance_id)
    }
}
