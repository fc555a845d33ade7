use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Synthetic leaderboard group containing every vehicle.
pub const ALL_GROUP: &str = "all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    pub vehicle_id: String,
    pub username: String,
    pub avatar: String,
    /// Race names the vehicle scored in, parallel to `points`.
    pub categories: Vec<String>,
    pub points: Vec<i32>,
    /// 1-based rank within the group.
    pub rank: usize,
    /// Previous rank minus current rank; positive means the vehicle climbed.
    pub rank_delta: i64,
}

impl LeaderboardEntry {
    pub fn total_points(&self) -> i64 {
        self.points.iter().map(|p| i64::from(*p)).sum()
    }
}
