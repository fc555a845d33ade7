use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use engine::{
    EngineError,
    dto::{
        telemetry::LatestTelemetry,
        vehicle::{VehicleRequest, validate_vehicle_id},
    },
    models::Vehicle,
};
use ingest::TelemetryArchive;
use validator::Validate;

use crate::{error::WebError, state::AppState};

#[utoipa::path(
    get,
    path = "/api/vehicles",
    responses(
        (status = 200, description = "Current roster", body = Vec<Vehicle>)
    ),
    tag = "vehicles"
)]
pub async fn list_vehicles(State(state): State<AppState>) -> Result<Response, WebError> {
    Ok(Json(state.service.store().vehicles()).into_response())
}

#[utoipa::path(
    post,
    path = "/api/vehicles",
    request_body = Vec<VehicleRequest>,
    responses(
        (status = 200, description = "Roster replaced", body = Vec<Vehicle>),
        (status = 400, description = "Invalid roster entry")
    ),
    tag = "vehicles"
)]
pub async fn set_roster(
    State(state): State<AppState>,
    Json(payload): Json<Vec<VehicleRequest>>,
) -> Result<Response, WebError> {
    for vehicle in &payload {
        vehicle.validate()?;
    }

    let roster = payload.into_iter().map(Vehicle::from).collect();
    let change = state.service.set_roster(roster).await;

    Ok(Json(change.vehicles).into_response())
}

#[utoipa::path(
    get,
    path = "/api/vehicles/{vehicle_id}/latest",
    params(
        ("vehicle_id" = String, Path, description = "Vehicle id")
    ),
    responses(
        (status = 200, description = "Newest archived reading per measurement", body = LatestTelemetry),
        (status = 400, description = "Vehicle id is not numeric"),
        (status = 503, description = "Archive unavailable")
    ),
    tag = "vehicles"
)]
pub async fn get_latest(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
) -> Result<Response, WebError> {
    if validate_vehicle_id(&vehicle_id).is_err() {
        return Err(WebError::BadRequest(format!(
            "Vehicle id must be numeric: {vehicle_id}"
        )));
    }

    let latest = state
        .archive
        .latest(&vehicle_id)
        .await
        .map_err(EngineError::from)?;

    Ok(Json(latest).into_response())
}
