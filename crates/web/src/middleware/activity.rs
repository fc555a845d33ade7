use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Marks the system as active for every control-plane request.
pub async fn track_activity(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state.service.activity().touch();
    next.run(request).await
}
