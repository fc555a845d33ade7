//! Full-state snapshot document and its on-disk store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::leaderboard::Leaderboards;
use crate::models::{Race, Settings, Vehicle};

const LATEST_FILE: &str = "state.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub instance_id: Option<Uuid>,
    #[serde(default)]
    pub last_save: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub races: Vec<Race>,
    #[serde(default)]
    pub leaderboards: Leaderboards,
}

/// Writes snapshots below a state directory.
///
/// Every save lands in `<dir>/<instance_id>/state_<timestamp>.json` and is
/// mirrored to `<dir>/state.json`, which is what gets loaded at startup.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE)
    }

    /// Saves the snapshot and returns the path of the timestamped copy.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let instance = snapshot
            .instance_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unassigned".to_string());
        let instance_dir = self.dir.join(instance);
        tokio::fs::create_dir_all(&instance_dir).await?;

        let saved_at = snapshot.last_save.unwrap_or_else(Utc::now);
        let archived = instance_dir.join(format!(
            "state_{}.json",
            saved_at.format("%Y%m%dT%H%M%S%.3fZ")
        ));

        let body = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&archived, &body).await?;
        tokio::fs::write(self.latest_path(), &body).await?;

        info!(path = %archived.display(), "Snapshot saved");
        Ok(archived)
    }

    /// Loads the latest snapshot. A missing file yields `None`.
    pub async fn load(&self) -> Result<Option<Snapshot>> {
        let path = self.latest_path();
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_slice(&body)?;
        info!(path = %path.display(), "Snapshot loaded");
        Ok(Some(snapshot))
    }
}
