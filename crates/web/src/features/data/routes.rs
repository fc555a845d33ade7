use axum::{
    Router,
    routing::{delete, post},
};

use super::handlers::{reset_data, save_data};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/data/save", post(save_data))
        .route("/data", delete(reset_data))
}
