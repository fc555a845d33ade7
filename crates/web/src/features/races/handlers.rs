use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use engine::{
    dto::race::{
        FinishRaceRequest, FinishRaceResponse, FinishVehicleRequest, FinishVehicleResponse,
        RaceRequest, RaceResult, ResultsQuery, StartRaceOutcome, StartRaceRequest,
    },
    models::{Race, RaceKey},
};
use validator::Validate;

use crate::{error::WebError, state::AppState};

#[utoipa::path(
    get,
    path = "/api/races",
    responses(
        (status = 200, description = "Race schedule with per-vehicle metrics", body = Vec<Race>)
    ),
    tag = "races"
)]
pub async fn list_races(State(state): State<AppState>) -> Result<Response, WebError> {
    Ok(Json(state.service.store().races()).into_response())
}

#[utoipa::path(
    post,
    path = "/api/races",
    request_body = Vec<RaceRequest>,
    responses(
        (status = 200, description = "Schedule replaced", body = Vec<Race>),
        (status = 400, description = "Invalid schedule entry")
    ),
    tag = "races"
)]
pub async fn set_schedule(
    State(state): State<AppState>,
    Json(payload): Json<Vec<RaceRequest>>,
) -> Result<Response, WebError> {
    for race in &payload {
        race.validate()?;
    }

    state.service.set_schedule(payload);

    Ok(Json(state.service.store().races()).into_response())
}

#[utoipa::path(
    get,
    path = "/api/results/{race_name}",
    params(
        ("race_name" = String, Path, description = "Race name"),
        ResultsQuery
    ),
    responses(
        (status = 200, description = "Efficiency results for every lap of the race", body = Vec<RaceResult>),
        (status = 404, description = "No race with this name")
    ),
    tag = "races"
)]
pub async fn get_results(
    State(state): State<AppState>,
    Path(race_name): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, WebError> {
    let results = state.service.store().compute_results(&race_name, query.lap)?;

    Ok(Json(results).into_response())
}

#[utoipa::path(
    post,
    path = "/api/race/start",
    request_body = Vec<StartRaceRequest>,
    responses(
        (status = 200, description = "One outcome per requested start", body = Vec<StartRaceOutcome>)
    ),
    tag = "races"
)]
pub async fn start_races(
    State(state): State<AppState>,
    Json(payload): Json<Vec<StartRaceRequest>>,
) -> Result<Response, WebError> {
    let mut outcomes = Vec::with_capacity(payload.len());

    for request in payload {
        match request.validate() {
            Ok(()) => outcomes.extend(state.service.start_races(vec![request])),
            Err(e) => outcomes.push(StartRaceOutcome {
                race_name: request.race_name,
                lap: request.lap,
                vehicle_id: request.vehicle_id,
                started: false,
                error_kind: Some("malformed_input".to_string()),
                error: Some(e.to_string()),
            }),
        }
    }

    Ok(Json(outcomes).into_response())
}

#[utoipa::path(
    post,
    path = "/api/race/finish",
    request_body = FinishRaceRequest,
    responses(
        (status = 200, description = "Race finished", body = FinishRaceResponse),
        (status = 404, description = "Race not found")
    ),
    tag = "races"
)]
pub async fn finish_race(
    State(state): State<AppState>,
    Json(payload): Json<FinishRaceRequest>,
) -> Result<Response, WebError> {
    payload.validate()?;

    let key = RaceKey::new(payload.race_name.clone(), payload.lap);
    let finished = state.service.finish_race(&key)?;

    let response = FinishRaceResponse {
        race_name: payload.race_name,
        lap: payload.lap,
        finished,
    };

    Ok(Json(response).into_response())
}

#[utoipa::path(
    post,
    path = "/api/vehicle/finish",
    request_body = FinishVehicleRequest,
    responses(
        (status = 200, description = "Vehicle finished its current race", body = FinishVehicleResponse),
        (status = 404, description = "Vehicle not found"),
        (status = 409, description = "Vehicle is not racing")
    ),
    tag = "races"
)]
pub async fn finish_vehicle(
    State(state): State<AppState>,
    Json(payload): Json<FinishVehicleRequest>,
) -> Result<Response, WebError> {
    payload.validate()?;

    let key = state.service.finish_vehicle(&payload.vehicle_id)?;

    let response = FinishVehicleResponse {
        vehicle_id: payload.vehicle_id,
        race_name: key.race_name,
        lap: key.lap,
    };

    Ok(Json(response).into_response())
}
