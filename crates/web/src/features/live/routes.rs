use axum::{Router, routing::get};

use super::handlers::live_socket;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(live_socket))
}
