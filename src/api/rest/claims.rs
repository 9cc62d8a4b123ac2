use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::missions::{CompleteMission, MissionCompletion, StartMission, complete_mission, start_mission};
use crate::engine::progression::{ClaimClosure, complete_driver_campaign};
use crate::error::AppError;
use crate::models::mission::{DriverMission, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/claims/:id/missions", post(create_mission))
        .route("/claims/:id/complete", post(complete_claim))
        .route("/missions/:id", get(get_mission))
        .route("/missions/:id/complete", post(finish_mission))
}

#[derive(Deserialize)]
pub struct CompleteClaimRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct DropOffQuery {
    pub driver_id: Uuid,
    pub lat: f64,
    pub lng: f64,
}

async fn create_mission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartMission>,
) -> Result<Json<DriverMission>, AppError> {
    Ok(Json(start_mission(&state, id, payload)?))
}

async fn complete_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteClaimRequest>,
) -> Result<Json<ClaimClosure>, AppError> {
    Ok(Json(complete_driver_campaign(&state, payload.driver_id, id)?))
}

async fn get_mission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverMission>, AppError> {
    Ok(Json(state.store.mission(id)?))
}

/// Body is the drop-off photo; driver and location ride in the query string.
async fn finish_mission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(drop_off): Query<DropOffQuery>,
    headers: HeaderMap,
    photo: Bytes,
) -> Result<Json<MissionCompletion>, AppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("image/jpeg");

    let completion = complete_mission(
        &state,
        id,
        CompleteMission {
            driver_id: drop_off.driver_id,
            location: GeoPoint {
                lat: drop_off.lat,
                lng: drop_off.lng,
            },
            photo: &photo,
            content_type,
        },
    )
    .await?;

    Ok(Json(completion))
}
