use axum::{Router, routing::post};

use super::handlers::{reset_points, update_points};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/points", post(update_points).delete(reset_points))
}
