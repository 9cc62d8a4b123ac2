use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver_campaign::{DriverCampaign, DriverCampaignStatus};
use crate::models::event::ProgressEvent;
use crate::models::rank::Rank;
use crate::state::AppState;

/// Batch sizes a driver can ever pick.
pub const BATCH_MENU: [u32; 5] = [25, 50, 100, 200, 500];

/// How the claimed bags reach the driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClaimFlow {
    /// Driver picks the bags up; the claim waits as `requested`.
    #[default]
    Request,
    /// Bags are shipped to the primary address; the claim starts `on the way`.
    Ship,
}

impl ClaimFlow {
    fn initial_status(self) -> DriverCampaignStatus {
        match self {
            ClaimFlow::Request => DriverCampaignStatus::Requested,
            ClaimFlow::Ship => DriverCampaignStatus::OnTheWay,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub campaign_id: Uuid,
    pub bags: u32,
    #[serde(default)]
    pub flow: ClaimFlow,
}

/// Bags the rank still lets the driver hold on top of unfinished missions.
pub fn rank_allowance(rank: Rank, uncompleted_missions: u32) -> u32 {
    rank.max_batch().saturating_sub(uncompleted_missions)
}

pub fn rank_permits(rank: Rank, uncompleted_missions: u32, bags: u32) -> bool {
    rank.allowed_batch_sizes().contains(&bags) && bags <= rank_allowance(rank, uncompleted_missions)
}

pub fn selectable_batch_sizes(rank: Rank, uncompleted_missions: u32, remaining_bags: u32) -> Vec<u32> {
    BATCH_MENU
        .iter()
        .copied()
        .filter(|&bags| rank_permits(rank, uncompleted_missions, bags) && bags <= remaining_bags)
        .collect()
}

pub fn batch_sizes_for(state: &AppState, driver_id: Uuid, campaign_id: Uuid) -> Result<Vec<u32>, AppError> {
    let driver = state.store.driver(driver_id)?;
    let campaign = state.store.campaign(campaign_id)?;

    Ok(selectable_batch_sizes(
        driver.rank,
        driver.uncompleted_missions_count,
        campaign.remaining_bags,
    ))
}

pub fn claim_bags(state: &AppState, driver_id: Uuid, request: ClaimRequest) -> Result<DriverCampaign, AppError> {
    let result = commit_claim(state, driver_id, &request);

    let outcome = match &result {
        Ok(_) => "success",
        Err(AppError::Internal(_)) => "error",
        Err(_) => "rejected",
    };
    state
        .metrics
        .bag_claims_total
        .with_label_values(&[outcome])
        .inc();

    if let Err(err) = &result {
        warn!(
            driver_id = %driver_id,
            campaign_id = %request.campaign_id,
            bags = request.bags,
            error = %err,
            "bag claim rejected"
        );
    }

    result
}

fn commit_claim(state: &AppState, driver_id: Uuid, request: &ClaimRequest) -> Result<DriverCampaign, AppError> {
    if !BATCH_MENU.contains(&request.bags) {
        return Err(AppError::BadRequest(format!(
            "batch size must be one of {BATCH_MENU:?}"
        )));
    }

    let driver = state.store.driver(driver_id)?;
    let shipping_address = state
        .store
        .primary_address(driver_id)
        .ok_or(AppError::MissingPrimaryAddress)?;

    if !rank_permits(driver.rank, driver.uncompleted_missions_count, request.bags) {
        return Err(AppError::BatchSizeNotAllowed(request.bags));
    }

    // Fresh read under the entry lock; whatever the caller saw may be stale.
    let remaining_bags = state.store.take_bags(request.campaign_id, request.bags)?;

    let now = Utc::now();
    let driver_campaign = DriverCampaign {
        id: Uuid::new_v4(),
        driver_id,
        campaign_id: request.campaign_id,
        bags_count: request.bags,
        bags_delivered: 0,
        bags_failed: 0,
        status: request.flow.initial_status(),
        potential_earnings: 0.0,
        current_earnings: 0.0,
        shipping_address: Some(shipping_address),
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .driver_campaigns
        .insert(driver_campaign.id, driver_campaign.clone());

    state.store.update_driver(driver_id, |driver| {
        driver.uncompleted_missions_count += request.bags;
        Ok(())
    })?;

    state.metrics.bags_claimed_total.inc_by(u64::from(request.bags));

    info!(
        driver_id = %driver_id,
        campaign_id = %request.campaign_id,
        driver_campaign_id = %driver_campaign.id,
        bags = request.bags,
        remaining_bags,
        "bags claimed"
    );

    state.publish(ProgressEvent::BagsClaimed {
        driver_id,
        driver_campaign_id: driver_campaign.id,
        campaign_id: request.campaign_id,
        bags: request.bags,
        remaining_bags,
        at: now,
    });

    Ok(driver_campaign)
}
