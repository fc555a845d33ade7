use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use engine::models::Settings;

use crate::{error::WebError, state::AppState};

#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Current race settings", body = Settings)
    ),
    tag = "settings"
)]
pub async fn get_settings(State(state): State<AppState>) -> Result<Response, WebError> {
    Ok(Json(state.service.store().settings()).into_response())
}

#[utoipa::path(
    post,
    path = "/api/settings",
    request_body = Settings,
    responses(
        (status = 200, description = "Settings stored and set-points published", body = Settings)
    ),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<Settings>,
) -> Result<Response, WebError> {
    let settings = state.service.update_settings(payload).await;

    Ok(Json(settings).into_response())
}
