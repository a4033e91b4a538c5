use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rideshare_booking::{CancelResult, CompleteResult, JoinResult, LeaveResult, RideListing, RiderPin, RosterEntry};
use rideshare_core::identity::Caller;
use rideshare_shared::{Ride, RideDocument};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RideDetail {
    #[serde(flatten)]
    pub listing: RideListing,
    pub cancellation_policy: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPinRequest {
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPinResponse {
    pub verified: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/rides", post(host_ride).get(browse_rides))
        .route("/v1/rides/{id}", get(get_ride))
        .route("/v1/rides/{id}/join", post(join_ride))
        .route("/v1/rides/{id}/leave", post(leave_ride))
        .route("/v1/rides/{id}/cancel", post(cancel_ride))
        .route("/v1/rides/{id}/complete", post(complete_ride))
        .route("/v1/rides/{id}/riders", get(ride_roster))
        .route("/v1/rides/{id}/pin", get(rider_pin))
        .route("/v1/rides/{id}/riders/{rider_id}/verify", post(verify_rider_pin))
}

async fn host_ride(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(document): Json<RideDocument>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    let ride = state.engine.host(&caller, document).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

async fn browse_rides(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<RideListing>>, AppError> {
    Ok(Json(state.engine.browse(&caller, query.tag).await?))
}

async fn get_ride(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<RideDetail>, AppError> {
    let listing = state.engine.ride(id).await?;
    let cancellation_policy = state.engine.policy().describe(&listing.ride);
    Ok(Json(RideDetail {
        listing,
        cancellation_policy,
    }))
}

async fn join_ride(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<JoinResult>, AppError> {
    Ok(Json(state.engine.join(id, &caller, None).await?))
}

async fn leave_ride(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeaveResult>, AppError> {
    Ok(Json(state.engine.leave(id, &caller).await?))
}

async fn cancel_ride(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<CancelResult>, AppError> {
    Ok(Json(state.engine.cancel(id, &caller, &payload.note).await?))
}

async fn complete_ride(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompleteResult>, AppError> {
    Ok(Json(state.engine.complete(id, &caller).await?))
}

async fn ride_roster(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RosterEntry>>, AppError> {
    Ok(Json(state.engine.roster(id, &caller).await?))
}

async fn rider_pin(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<RiderPin>, AppError> {
    Ok(Json(state.engine.rider_pin(id, &caller).await?))
}

async fn verify_rider_pin(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, rider_id)): Path<(Uuid, String)>,
    Json(payload): Json<VerifyPinRequest>,
) -> Result<Json<VerifyPinResponse>, AppError> {
    let verified = state.engine.verify_pin(id, &caller, &rider_id, &payload.pin).await?;
    Ok(Json(VerifyPinResponse { verified }))
}
