use axum::{Router, routing::get};

use super::handlers::{get_latest, list_vehicles, set_roster};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vehicles", get(list_vehicles).post(set_roster))
        .route("/vehicles/:vehicle_id/latest", get(get_latest))
}
