use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::allocation::{ClaimRequest, batch_sizes_for, claim_bags};
use crate::engine::matching::matching_campaigns;
use crate::engine::scan::{ScanOutcome, handle_scan};
use crate::error::AppError;
use crate::geo::geocoder::geocoding_error;
use crate::models::campaign::CampaignListing;
use crate::models::driver::{Driver, ShippingAddress};
use crate::models::driver_campaign::DriverCampaign;
use crate::models::mission::DriverMission;
use crate::models::rank::Rank;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/service-area", put(update_service_area))
        .route(
            "/drivers/:id/addresses",
            post(add_address).get(list_addresses),
        )
        .route(
            "/drivers/:id/addresses/:address_id/primary",
            put(set_primary_address),
        )
        .route("/drivers/:id/campaigns", get(list_campaigns))
        .route(
            "/drivers/:id/campaigns/:campaign_id/batch-sizes",
            get(list_batch_sizes),
        )
        .route("/drivers/:id/claims", post(create_claim).get(list_claims))
        .route("/drivers/:id/scan", post(scan))
        .route("/drivers/:id/missions", get(list_missions))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub rank: Option<Rank>,
}

#[derive(Deserialize)]
pub struct ServiceAreaRequest {
    pub zip_codes: Vec<String>,
    #[serde(default)]
    pub miles_radius: u32,
}

#[derive(Deserialize)]
pub struct AddAddressRequest {
    pub line1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Deserialize)]
pub struct ScanRequest {
    pub payload: String,
}

#[derive(Serialize)]
pub struct BatchSizesResponse {
    pub campaign_id: Uuid,
    pub sizes: Vec<u32>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let mut driver = Driver::new(payload.name.trim().to_string());
    if let Some(rank) = payload.rank {
        driver.rank = rank;
    }

    state.store.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(state.store.driver(id)?))
}

async fn update_service_area(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ServiceAreaRequest>,
) -> Result<Json<Driver>, AppError> {
    state.store.driver(id)?;

    let zip_codes: BTreeSet<String> = payload
        .zip_codes
        .iter()
        .map(|zip| zip.trim().to_string())
        .filter(|zip| !zip.is_empty())
        .collect();

    let mut states = BTreeSet::new();
    for zip in &zip_codes {
        let state_code = state
            .geocoder
            .state_for_zip(zip)
            .await
            .map_err(geocoding_error)?
            .ok_or_else(|| AppError::BadRequest(format!("unknown zip code {zip}")))?;
        states.insert(state_code.to_ascii_uppercase());
    }

    let driver = state.store.update_driver(id, |driver| {
        driver.zip_codes = zip_codes;
        driver.states = states;
        driver.miles_radius = payload.miles_radius;
        Ok(driver.clone())
    })?;

    info!(
        driver_id = %id,
        zip_codes = driver.zip_codes.len(),
        states = driver.states.len(),
        "service area updated"
    );
    Ok(Json(driver))
}

async fn add_address(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddAddressRequest>,
) -> Result<Json<ShippingAddress>, AppError> {
    state.store.driver(id)?;

    let fields = [&payload.line1, &payload.city, &payload.state, &payload.zip];
    if fields.iter().any(|field| field.trim().is_empty()) {
        return Err(AppError::BadRequest(
            "line1, city, state and zip are required".to_string(),
        ));
    }

    let address = state.store.add_address(ShippingAddress {
        id: Uuid::new_v4(),
        driver_id: id,
        line1: payload.line1.trim().to_string(),
        city: payload.city.trim().to_string(),
        state: payload.state.trim().to_ascii_uppercase(),
        zip: payload.zip.trim().to_string(),
        is_primary: false,
    });

    Ok(Json(address))
}

async fn list_addresses(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ShippingAddress>>, AppError> {
    state.store.driver(id)?;
    Ok(Json(state.store.addresses(id)))
}

async fn set_primary_address(
    State(state): State<Arc<AppState>>,
    Path((id, address_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<ShippingAddress>>, AppError> {
    state.store.driver(id)?;
    Ok(Json(state.store.set_primary_address(id, address_id)?))
}

async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CampaignListing>>, AppError> {
    Ok(Json(matching_campaigns(&state, id)?))
}

async fn list_batch_sizes(
    State(state): State<Arc<AppState>>,
    Path((id, campaign_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BatchSizesResponse>, AppError> {
    Ok(Json(BatchSizesResponse {
        campaign_id,
        sizes: batch_sizes_for(&state, id, campaign_id)?,
    }))
}

async fn create_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<DriverCampaign>, AppError> {
    Ok(Json(claim_bags(&state, id, payload)?))
}

async fn list_claims(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverCampaign>>, AppError> {
    state.store.driver(id)?;
    Ok(Json(state.store.driver_campaigns_for_driver(id)))
}

async fn scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ScanOutcome>, AppError> {
    Ok(Json(handle_scan(&state, id, &payload.payload)?))
}

async fn list_missions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverMission>>, AppError> {
    state.store.driver(id)?;
    Ok(Json(state.store.recent_missions(id, usize::MAX)))
}
