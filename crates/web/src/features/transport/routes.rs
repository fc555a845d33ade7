use axum::{
    Router,
    routing::{get, put},
};

use super::handlers::{clear_log, get_log, send_raw};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transport/send/*topic", put(send_raw))
        .route("/transport/log", get(get_log).delete(clear_log))
}
