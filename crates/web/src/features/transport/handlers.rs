use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{error::WebError, state::AppState};

#[utoipa::path(
    put,
    path = "/api/transport/send/{topic}",
    params(
        ("topic" = String, Path, description = "Destination topic, may contain slashes")
    ),
    request_body(content = String, description = "Raw payload", content_type = "application/octet-stream"),
    responses(
        (status = 202, description = "Payload handed to the broker"),
        (status = 503, description = "Broker unavailable")
    ),
    tag = "transport"
)]
pub async fn send_raw(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<Response, WebError> {
    state.service.publish_raw(&topic, body.to_vec()).await?;

    Ok(StatusCode::ACCEPTED.into_response())
}

#[utoipa::path(
    get,
    path = "/api/transport/log",
    responses(
        (status = 200, description = "Inbound messages, newest first", body = Vec<String>)
    ),
    tag = "transport"
)]
pub async fn get_log(State(state): State<AppState>) -> Result<Response, WebError> {
    Ok(Json(state.log.entries()).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/transport/log",
    responses(
        (status = 204, description = "Message log cleared")
    ),
    tag = "transport"
)]
pub async fn clear_log(State(state): State<AppState>) -> Result<Response, WebError> {
    state.log.clear();

    Ok(StatusCode::NO_CONTENT.into_response())
}
