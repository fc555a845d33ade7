use axum::{Router, middleware};

use crate::features::{data, leaderboard, live, points, races, settings, transport, vehicles};
use crate::middleware::activity::track_activity;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(vehicles::routes())
        .merge(races::routes())
        .merge(leaderboard::routes())
        .merge(points::routes())
        .merge(settings::routes())
        .merge(transport::routes())
        .merge(data::routes());

    Router::new()
        .nest("/api", api)
        .merge(live::routes())
        .layer(middleware::from_fn_with_state(state.clone(), track_activity))
        .with_state(state)
}
