use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use engine::models::LeaderboardEntry;

use crate::{error::WebError, state::AppState};

#[utoipa::path(
    get,
    path = "/api/leaderboard/{group}",
    params(
        ("group" = String, Path, description = "Category name, or \"all\"")
    ),
    responses(
        (status = 200, description = "Ranked standings for the group", body = Vec<LeaderboardEntry>),
        (status = 404, description = "No leaderboard for this group")
    ),
    tag = "leaderboard"
)]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Response, WebError> {
    let standings = state.service.store().leaderboard(&group)?;

    Ok(Json(standings).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/leaderboard/{group}",
    params(
        ("group" = String, Path, description = "Category name, or \"all\"")
    ),
    responses(
        (status = 204, description = "Rank changes cleared"),
        (status = 404, description = "No leaderboard for this group")
    ),
    tag = "leaderboard"
)]
pub async fn reset_leaderboard(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Response, WebError> {
    state.service.store().reset_leaderboard(&group)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
