use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use engine::{
    dto::points::{PointsRequest, ResetPointsQuery},
    models::LeaderboardEntry,
};
use validator::Validate;

use crate::{error::WebError, state::AppState};

#[utoipa::path(
    post,
    path = "/api/points",
    request_body = PointsRequest,
    responses(
        (status = 200, description = "Points stored, overall standings returned", body = Vec<LeaderboardEntry>),
        (status = 400, description = "Invalid request")
    ),
    tag = "points"
)]
pub async fn update_points(
    State(state): State<AppState>,
    Json(payload): Json<PointsRequest>,
) -> Result<Response, WebError> {
    payload.validate()?;

    let standings = state.service.update_points(&payload);

    Ok(Json(standings).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/points",
    params(ResetPointsQuery),
    responses(
        (status = 200, description = "Points cleared, overall standings returned", body = Vec<LeaderboardEntry>),
        (status = 400, description = "Missing category"),
        (status = 404, description = "No race carries this category name")
    ),
    tag = "points"
)]
pub async fn reset_points(
    State(state): State<AppState>,
    Query(query): Query<ResetPointsQuery>,
) -> Result<Response, WebError> {
    if query.category.trim().is_empty() {
        return Err(WebError::BadRequest("category is required".to_string()));
    }

    let standings = state.service.reset_points(&query.category)?;

    Ok(Json(standings).into_response())
}
