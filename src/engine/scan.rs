use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver_campaign::{DriverCampaign, DriverCampaignStatus};
use crate::models::event::ProgressEvent;
use crate::models::mission::MissionStatus;
use crate::state::AppState;

pub const REASSIGN_PREFIX: &str = "REASSIGN_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPayload {
    /// Hand a driver campaign over to whoever scans the code.
    Reassign(Uuid),
    /// A campaign's own code, printed on its bags.
    Campaign(Uuid),
}

pub fn parse(payload: &str) -> Result<ScanPayload, AppError> {
    let payload = payload.trim();

    let (raw, reassign) = match payload.strip_prefix(REASSIGN_PREFIX) {
        Some(rest) => (rest, true),
        None => (payload, false),
    };

    let id = Uuid::parse_str(raw)
        .map_err(|_| AppError::BadRequest(format!("unrecognized QR code: {payload}")))?;

    Ok(if reassign {
        ScanPayload::Reassign(id)
    } else {
        ScanPayload::Campaign(id)
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    Activated { driver_campaign: DriverCampaign },
    Reassigned { driver_campaign: DriverCampaign, previous_driver_id: Uuid },
}

pub fn handle_scan(state: &AppState, driver_id: Uuid, payload: &str) -> Result<ScanOutcome, AppError> {
    state.store.driver(driver_id)?;

    match parse(payload)? {
        ScanPayload::Reassign(driver_campaign_id) => reassign(state, driver_id, driver_campaign_id),
        ScanPayload::Campaign(campaign_id) => activate(state, driver_id, campaign_id),
    }
}

fn activate(state: &AppState, driver_id: Uuid, campaign_id: Uuid) -> Result<ScanOutcome, AppError> {
    let pending = state
        .store
        .driver_campaigns_for_driver(driver_id)
        .into_iter()
        .filter(|claim| claim.campaign_id == campaign_id && claim.status.is_pending())
        .min_by_key(|claim| claim.created_at)
        .ok_or_else(|| {
            AppError::NotFound(format!("no pending claim for campaign {campaign_id}"))
        })?;

    let driver_campaign = state.store.update_driver_campaign(pending.id, |claim| {
        if !claim.status.is_pending() {
            return Err(AppError::Conflict(format!(
                "driver campaign {} is already {}",
                claim.id,
                claim.status.as_str()
            )));
        }
        claim.status = DriverCampaignStatus::Active;
        Ok(claim.clone())
    })?;

    info!(
        driver_id = %driver_id,
        driver_campaign_id = %driver_campaign.id,
        "driver campaign activated"
    );
    state.publish(ProgressEvent::ClaimActivated {
        driver_id,
        driver_campaign_id: driver_campaign.id,
        at: Utc::now(),
    });

    Ok(ScanOutcome::Activated { driver_campaign })
}

fn reassign(state: &AppState, driver_id: Uuid, driver_campaign_id: Uuid) -> Result<ScanOutcome, AppError> {
    let (previous_driver_id, outstanding, driver_campaign) =
        state
            .store
            .update_driver_campaign(driver_campaign_id, |claim| {
                if claim.status == DriverCampaignStatus::Completed {
                    return Err(AppError::Conflict(format!(
                        "driver campaign {driver_campaign_id} is already completed"
                    )));
                }
                if claim.driver_id == driver_id {
                    return Err(AppError::Conflict(format!(
                        "driver campaign {driver_campaign_id} already belongs to this driver"
                    )));
                }
                let previous = claim.driver_id;
                claim.driver_id = driver_id;
                Ok((previous, claim.outstanding_bags(), claim.clone()))
            })?;

    let mut moved_missions = 0usize;
    for mut mission in state.store.missions.iter_mut() {
        if mission.driver_campaign_id == driver_campaign_id && mission.status == MissionStatus::Active {
            mission.driver_id = driver_id;
            moved_missions += 1;
        }
    }

    if let Err(err) = state.store.update_driver(previous_driver_id, |driver| {
        driver.uncompleted_missions_count = driver.uncompleted_missions_count.saturating_sub(outstanding);
        Ok(())
    }) {
        warn!(
            driver_id = %previous_driver_id,
            error = %err,
            "previous driver not updated after reassignment"
        );
    }

    state.store.update_driver(driver_id, |driver| {
        driver.uncompleted_missions_count += outstanding;
        Ok(())
    })?;

    info!(
        driver_id = %driver_id,
        previous_driver_id = %previous_driver_id,
        driver_campaign_id = %driver_campaign_id,
        outstanding,
        moved_missions,
        "driver campaign reassigned"
    );
    state.publish(ProgressEvent::ClaimReassigned {
        driver_id,
        previous_driver_id,
        driver_campaign_id,
        at: Utc::now(),
    });

    Ok(ScanOutcome::Reassigned {
        driver_campaign,
        previous_driver_id,
    })
}
