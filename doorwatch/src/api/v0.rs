//! API v0 endpoints.
//!
//! The door event paths are what the sensors themselves call, so they sit
//! at the root rather than under a version prefix. Version 0 signals that
//! the status endpoints may still change.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::server::SharedState;
use crate::alarm::AlarmSnapshot;
use crate::api_client::types::{AlarmView, SensorView};
use crate::error::StoreError;
use crate::sensor::Sensor;

/// Build the v0 API routes with OpenAPI metadata.
pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(door_opened))
        .routes(routes!(door_closed))
        .routes(routes!(get_sensors))
        .routes(routes!(get_sensor))
}

fn sensor_view(sensor: Sensor, alarm: Option<AlarmSnapshot>) -> SensorView {
    SensorView {
        last_updated_ms: sensor.last_updated_ms(),
        id: sensor.id,
        state: sensor.state,
        alarm: alarm.map(|alarm| AlarmView {
            phase: alarm.phase,
            fires_in_secs: alarm.remaining.map(|d| d.as_secs()),
            receipt: alarm.receipt.map(|r| r.as_str().to_string()),
        }),
    }
}

/// Store failures are already logged by the monitor.
fn internal_error(_: StoreError) -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

fn validate_id(sensor_id: &str) -> Result<(), StatusCode> {
    if sensor_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = OK, description = "Server is running", body = String),
    ),
)]
async fn health() -> &'static str {
    "OK"
}

/// Record that a door was opened and start its alarm.
#[utoipa::path(
    post,
    path = "/door-opened/{sensor_id}",
    tag = "events",
    params(
        ("sensor_id" = String, Path, description = "Sensor identifier"),
    ),
    responses(
        (status = OK, description = "Updated sensor", body = SensorView),
        (status = BAD_REQUEST, description = "Empty sensor identifier"),
        (status = INTERNAL_SERVER_ERROR, description = "Sensor state could not be saved"),
    ),
)]
async fn door_opened(
    State(state): State<SharedState>,
    Path(sensor_id): Path<String>,
) -> Result<Json<SensorView>, StatusCode> {
    validate_id(&sensor_id)?;
    let (sensor, alarm) = state
        .monitor
        .door_opened(&sensor_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(sensor_view(sensor, alarm)))
}

/// Record that a door was closed and clear its alarm.
#[utoipa::path(
    post,
    path = "/door-closed/{sensor_id}",
    tag = "events",
    params(
        ("sensor_id" = String, Path, description = "Sensor identifier"),
    ),
    responses(
        (status = OK, description = "Updated sensor", body = SensorView),
        (status = BAD_REQUEST, description = "Empty sensor identifier"),
        (status = INTERNAL_SERVER_ERROR, description = "Sensor state could not be saved"),
    ),
)]
async fn door_closed(
    State(state): State<SharedState>,
    Path(sensor_id): Path<String>,
) -> Result<Json<SensorView>, StatusCode> {
    validate_id(&sensor_id)?;
    let (sensor, alarm) = state
        .monitor
        .door_closed(&sensor_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(sensor_view(sensor, alarm)))
}

/// Return all known sensors.
#[utoipa::path(
    get,
    path = "/sensors",
    tag = "sensors",
    responses(
        (status = OK, description = "Sensors ordered by id", body = Vec<SensorView>),
        (status = INTERNAL_SERVER_ERROR, description = "Sensor store unavailable"),
    ),
)]
async fn get_sensors(State(state): State<SharedState>) -> Result<Json<Vec<SensorView>>, StatusCode> {
    let sensors = state.monitor.sensors().map_err(internal_error)?;
    Ok(Json(
        sensors
            .into_iter()
            .map(|(sensor, alarm)| sensor_view(sensor, alarm))
            .collect(),
    ))
}

/// Return a single sensor, or 404 if it has never reported.
#[utoipa::path(
    get,
    path = "/sensors/{sensor_id}",
    tag = "sensors",
    params(
        ("sensor_id" = String, Path, description = "Sensor identifier"),
    ),
    responses(
        (status = OK, description = "Sensor details", body = SensorView),
        (status = NOT_FOUND, description = "Sensor not found"),
        (status = INTERNAL_SERVER_ERROR, description = "Sensor store unavailable"),
    ),
)]
async fn get_sensor(
    State(state): State<SharedState>,
    Path(sensor_id): Path<String>,
) -> Result<Json<SensorView>, StatusCode> {
    state
        .monitor
        .sensor(&sensor_id)
        .map_err(internal_error)?
        .map(|(sensor, alarm)| Json(sensor_view(sensor, alarm)))
        .ok_or(StatusCode::NOT_FOUND)
}
