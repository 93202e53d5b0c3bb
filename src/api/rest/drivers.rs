use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::tracking::ProximityOutcome;
use crate::error::AppError;
use crate::models::driver::{Availability, Driver, GeoPoint};
use crate::models::id::RecordId;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/person/:person_id", get(get_driver_by_person))
        .route("/drivers/:id/location", put(update_driver_location))
        .route("/drivers/:id/availability", patch(update_driver_availability))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDriverRequest {
    #[serde(alias = "userId")]
    pub person_id: RecordId,
    pub current_location: Option<GeoPoint>,
    pub availability: Option<Availability>,
}

#[derive(Deserialize)]
pub struct ListDriversQuery {
    pub availability: Option<Availability>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub availability: Availability,
}

#[derive(Serialize)]
pub struct LocationUpdateResponse {
    pub driver: Driver,
    pub proximity: ProximityOutcome,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    let driver = state.registry().register(
        payload.person_id,
        payload.current_location,
        payload.availability,
    )?;

    tracing::info!(driver_id = %driver.id, person_id = %driver.person_id, "driver registered");
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDriversQuery>,
) -> Json<Vec<Driver>> {
    let drivers = match query.availability {
        Some(Availability::Available) => state.registry().list_available(),
        Some(availability) => state
            .registry()
            .list()
            .into_iter()
            .filter(|driver| driver.availability == availability)
            .collect(),
        None => state.registry().list(),
    };

    Json(drivers)
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(state.registry().get_by_id(id)?))
}

async fn get_driver_by_person(
    State(state): State<Arc<AppState>>,
    Path(person_id): Path<RecordId>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(state.registry().get_by_person_id(&person_id)?))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<LocationUpdateResponse>, AppError> {
    let (Some(latitude), Some(longitude)) = (payload.latitude, payload.longitude) else {
        return Err(AppError::Validation(
            "latitude and longitude are required".to_string(),
        ));
    };

    let (driver, proximity) = state
        .engine
        .update_location(id, GeoPoint::new(latitude, longitude))
        .await?;

    Ok(Json(LocationUpdateResponse { driver, proximity }))
}

async fn update_driver_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.registry().set_availability(id, payload.availability)?;
    Ok(Json(driver))
}
