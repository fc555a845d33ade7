use axum::{Router, routing::get};

use super::handlers::{get_settings, update_settings};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).post(update_settings))
}
