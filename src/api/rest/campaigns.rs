use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::campaign::{Advertiser, Campaign};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/advertisers", post(create_advertiser))
        .route("/campaigns", post(create_campaign))
        .route("/campaigns/:id", get(get_campaign))
}

#[derive(Deserialize)]
pub struct CreateAdvertiserRequest {
    pub name: String,
    pub logo_url: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCampaignRequest {
    pub advertiser_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub nation: bool,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub zip_codes: Vec<String>,
    pub bags_count: u32,
    pub remaining_bags: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
}

async fn create_advertiser(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAdvertiserRequest>,
) -> Result<Json<Advertiser>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let advertiser = Advertiser {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        logo_url: payload.logo_url.filter(|url| !url.trim().is_empty()),
    };

    state
        .store
        .advertisers
        .insert(advertiser.id, advertiser.clone());
    Ok(Json(advertiser))
}

async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<Json<Campaign>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if state.store.advertiser(payload.advertiser_id).is_none() {
        return Err(AppError::NotFound(format!(
            "advertiser {} not found",
            payload.advertiser_id
        )));
    }

    let remaining_bags = payload.remaining_bags.unwrap_or(payload.bags_count);
    if remaining_bags > payload.bags_count {
        return Err(AppError::BadRequest(
            "remaining_bags cannot exceed bags_count".to_string(),
        ));
    }

    let now = Utc::now();
    let campaign = Campaign {
        id: Uuid::new_v4(),
        advertiser_id: payload.advertiser_id,
        name: payload.name.trim().to_string(),
        nation: payload.nation,
        states: payload
            .states
            .iter()
            .map(|state| state.trim().to_ascii_uppercase())
            .filter(|state| !state.is_empty())
            .collect(),
        zip_codes: payload
            .zip_codes
            .iter()
            .map(|zip| zip.trim().to_string())
            .filter(|zip| !zip.is_empty())
            .collect(),
        bags_count: payload.bags_count,
        remaining_bags,
        start_date: payload.start_date.unwrap_or(now),
        created_at: now,
    };

    state.store.campaigns.insert(campaign.id, campaign.clone());
    Ok(Json(campaign))
}

async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    Ok(Json(state.store.campaign(id)?))
}
