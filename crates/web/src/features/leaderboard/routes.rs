use axum::{Router, routing::get};

use super::handlers::{get_leaderboard, reset_leaderboard};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/leaderboard/:group", get(get_leaderboard).delete(reset_leaderboard))
}
