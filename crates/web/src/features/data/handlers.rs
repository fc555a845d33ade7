use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::WebError, state::AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct SaveResponse {
    pub instance_id: Uuid,
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    pub instance_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/data/save",
    responses(
        (status = 200, description = "Snapshot written", body = SaveResponse),
        (status = 500, description = "Snapshot could not be written")
    ),
    tag = "data"
)]
pub async fn save_data(State(state): State<AppState>) -> Result<Response, WebError> {
    let path = state.service.save_snapshot().await?;

    let response = SaveResponse {
        instance_id: state.service.store().instance_id(),
        path: path.display().to_string(),
    };

    Ok(Json(response).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/data",
    responses(
        (status = 200, description = "State saved and cleared under a new instance id", body = ResetResponse),
        (status = 500, description = "Snapshot could not be written, nothing was cleared")
    ),
    tag = "data"
)]
pub async fn reset_data(State(state): State<AppState>) -> Result<Response, WebError> {
    let instance_id = state.service.reset_data().await?;
    tracing::info!(instance_id = %instance_id, "Race data reset");

    Ok(Json(ResetResponse { instance_id }).into_response())
}
