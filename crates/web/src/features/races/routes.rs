use axum::{
    Router,
    routing::{get, post},
};

use super::handlers::{
    finish_race, finish_vehicle, get_results, list_races, set_schedule, start_races,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/races", get(list_races).post(set_schedule))
        .route("/results/:race_name", get(get_results))
        .route("/race/start", post(start_races))
        .route("/race/finish", post(finish_race))
        .route("/vehicle/finish", post(finish_vehicle))
}
