use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::driver_campaign::{DriverCampaign, DriverCampaignStatus};
use crate::models::event::ProgressEvent;
use crate::models::mission::{DriverMission, MissionStatus};
use crate::models::rank::Rank;
use crate::state::AppState;

/// Missions considered when checking a driver's recent failures.
pub const FAILURE_WINDOW: usize = 100;

const EARNINGS_PER_BAG: f64 = 1.0;

/// Bags a claim must deliver before its earnings are locked in. The standard
/// tiers are hand-tuned; anything else is 92% rounded down.
pub fn target_objective(bags_count: u32) -> u32 {
    match bags_count {
        25 => 23,
        50 => 46,
        100 => 92,
        200 => 184,
        500 => 470,
        other => (u64::from(other) * 92 / 100) as u32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryOutcome {
    /// Amount added to the claim's locked-in earnings.
    pub current_delta: f64,
    pub closed: bool,
}

/// Counts one delivered bag against the claim.
///
/// Below target the bag only adds to `potential_earnings`. The delivery that
/// reaches the target moves everything accumulated so far, plus this bag, into
/// `current_earnings`; later deliveries add straight to `current_earnings`.
pub fn record_delivery(driver_campaign: &mut DriverCampaign) -> Result<DeliveryOutcome, AppError> {
    if driver_campaign.status == DriverCampaignStatus::Completed {
        return Err(AppError::Conflict(format!(
            "driver campaign {} is already completed",
            driver_campaign.id
        )));
    }
    if driver_campaign.bags_delivered + driver_campaign.bags_failed >= driver_campaign.bags_count {
        return Err(AppError::Conflict(format!(
            "all bags of driver campaign {} are accounted for",
            driver_campaign.id
        )));
    }

    driver_campaign.bags_delivered += 1;
    let target = target_objective(driver_campaign.bags_count);

    let current_delta = if driver_campaign.bags_delivered < target {
        driver_campaign.potential_earnings += EARNINGS_PER_BAG;
        0.0
    } else if driver_campaign.bags_delivered == target {
        let locked = driver_campaign.potential_earnings + EARNINGS_PER_BAG;
        driver_campaign.potential_earnings = 0.0;
        driver_campaign.current_earnings += locked;
        locked
    } else {
        driver_campaign.current_earnings += EARNINGS_PER_BAG;
        EARNINGS_PER_BAG
    };

    let closed = driver_campaign.bags_delivered >= driver_campaign.bags_count;
    if closed {
        driver_campaign.status = DriverCampaignStatus::Completed;
    }

    Ok(DeliveryOutcome {
        current_delta,
        closed,
    })
}

/// Closes a claim before every bag is delivered. Undelivered bags are written
/// off as failed and, if the target was never reached, the potential earnings
/// are halved. Returns the number of failed bags.
pub fn finalize_early(driver_campaign: &mut DriverCampaign) -> Result<u32, AppError> {
    if driver_campaign.status == DriverCampaignStatus::Completed {
        return Err(AppError::Conflict(format!(
            "driver campaign {} is already completed",
            driver_campaign.id
        )));
    }

    let failed = driver_campaign
        .bags_count
        .saturating_sub(driver_campaign.bags_delivered);
    driver_campaign.bags_failed = failed;

    if driver_campaign.bags_delivered < target_objective(driver_campaign.bags_count) {
        driver_campaign.potential_earnings /= 2.0;
    }

    driver_campaign.status = DriverCampaignStatus::Completed;
    Ok(failed)
}

pub fn failed_in_window(recent: &[DriverMission]) -> u32 {
    recent
        .iter()
        .take(FAILURE_WINDOW)
        .filter(|mission| mission.status == MissionStatus::Failed)
        .count() as u32
}

/// One step up from `rank`, never more: only the current rank's next target is
/// checked.
pub fn next_rank(rank: Rank, completed_missions: u32, failed_in_window: u32) -> Option<Rank> {
    let promotion = rank.promotion()?;

    if completed_missions > promotion.required_completed
        && failed_in_window <= promotion.max_failed_in_last_100
    {
        Some(promotion.next)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub driver_campaign: DriverCampaign,
    pub driver: Driver,
    pub earnings_delta: f64,
    pub promoted_to: Option<Rank>,
}

/// Completes an active mission and counts it against its claim, then updates
/// the driver aggregate and re-checks the rank.
///
/// The mission flip happens under the claim's entry lock and only after the
/// delivery was accepted, so a claim closed in the meantime leaves the mission
/// untouched. `finish` stamps the drop-off details and may veto the flip.
pub fn apply_mission_completion(
    state: &AppState,
    mission_id: Uuid,
    finish: impl FnOnce(&mut DriverMission) -> Result<(), AppError>,
) -> Result<(DriverMission, ProgressUpdate), AppError> {
    let driver_campaign_id = state.store.mission(mission_id)?.driver_campaign_id;

    let (outcome, driver_campaign, mission) =
        state
            .store
            .update_driver_campaign(driver_campaign_id, |driver_campaign| {
                let mut updated = driver_campaign.clone();
                let outcome = record_delivery(&mut updated)?;

                let mission = state.store.update_mission(mission_id, |mission| {
                    if mission.status != MissionStatus::Active {
                        return Err(AppError::Conflict(format!(
                            "mission {mission_id} is already finished"
                        )));
                    }
                    finish(mission)?;
                    mission.status = MissionStatus::Completed;
                    Ok(mission.clone())
                })?;

                *driver_campaign = updated;
                Ok((outcome, driver_campaign.clone(), mission))
            })?;

    state.store.update_driver(mission.driver_id, |driver| {
        driver.completed_missions_count += 1;
        driver.uncompleted_missions_count = driver.uncompleted_missions_count.saturating_sub(1);
        driver.current_earnings += outcome.current_delta;
        Ok(())
    })?;

    let failed_recently = failed_in_window(
        &state
            .store
            .recent_missions(mission.driver_id, FAILURE_WINDOW),
    );

    let (driver, promoted) = state.store.update_driver(mission.driver_id, |driver| {
        let promoted = next_rank(driver.rank, driver.completed_missions_count, failed_recently)
            .map(|next| {
                let from = driver.rank;
                driver.rank = next;
                (from, next)
            });
        Ok((driver.clone(), promoted))
    })?;

    if outcome.closed {
        info!(
            driver_id = %mission.driver_id,
            driver_campaign_id = %driver_campaign.id,
            bags_delivered = driver_campaign.bags_delivered,
            "driver campaign completed"
        );
        state.publish(ProgressEvent::CampaignCompleted {
            driver_id: mission.driver_id,
            driver_campaign_id: driver_campaign.id,
            bags_delivered: driver_campaign.bags_delivered,
            bags_failed: driver_campaign.bags_failed,
            at: Utc::now(),
        });
    }

    if let Some((from, to)) = promoted {
        info!(driver_id = %driver.id, from = from.as_str(), to = to.as_str(), "rank promoted");
        state
            .metrics
            .rank_promotions_total
            .with_label_values(&[to.as_str()])
            .inc();
        state.publish(ProgressEvent::RankPromoted {
            driver_id: driver.id,
            from,
            to,
            at: Utc::now(),
        });
    }

    Ok((
        mission,
        ProgressUpdate {
            driver_campaign,
            driver,
            earnings_delta: outcome.current_delta,
            promoted_to: promoted.map(|(_, to)| to),
        },
    ))
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimClosure {
    pub driver_campaign: DriverCampaign,
    pub bags_failed: u32,
    pub missions_failed: usize,
}

/// Driver-initiated "complete case": closes the claim early. Every bag not
/// delivered counts as failed on the claim and the driver; of the mission
/// records, only the ones still active are flipped to failed.
pub fn complete_driver_campaign(
    state: &AppState,
    driver_id: Uuid,
    driver_campaign_id: Uuid,
) -> Result<ClaimClosure, AppError> {
    let (failed, driver_campaign) =
        state
            .store
            .update_driver_campaign(driver_campaign_id, |driver_campaign| {
                if driver_campaign.driver_id != driver_id {
                    return Err(AppError::Conflict(format!(
                        "driver campaign {driver_campaign_id} belongs to another driver"
                    )));
                }
                let failed = finalize_early(driver_campaign)?;
                Ok((failed, driver_campaign.clone()))
            })?;

    let now = Utc::now();
    let mut marked = 0usize;
    for mission in state.store.missions_for_driver_campaign(driver_campaign_id) {
        if mission.status != MissionStatus::Active {
            continue;
        }
        let flipped = state.store.update_mission(mission.id, |mission| {
            if mission.status != MissionStatus::Active {
                return Ok(false);
            }
            mission.status = MissionStatus::Failed;
            mission.finished_at = Some(now);
            Ok(true)
        })?;
        if flipped {
            marked += 1;
            state.metrics.active_missions.dec();
        }
    }

    if let Err(err) = state.store.update_driver(driver_campaign.driver_id, |driver| {
        driver.failed_missions_count += failed;
        driver.uncompleted_missions_count = driver.uncompleted_missions_count.saturating_sub(failed);
        Ok(())
    }) {
        warn!(
            driver_id = %driver_campaign.driver_id,
            error = %err,
            "driver counters not updated after early completion"
        );
        return Err(err);
    }

    info!(
        driver_id = %driver_campaign.driver_id,
        driver_campaign_id = %driver_campaign_id,
        bags_delivered = driver_campaign.bags_delivered,
        bags_failed = failed,
        potential_earnings = driver_campaign.potential_earnings,
        "driver campaign completed early"
    );

    state.publish(ProgressEvent::CampaignCompleted {
        driver_id: driver_campaign.driver_id,
        driver_campaign_id,
        bags_delivered: driver_campaign.bags_delivered,
        bags_failed: failed,
        at: now,
    });

    Ok(ClaimClosure {
        driver_campaign,
        bags_failed: failed,
        missions_failed: marked,
    })
}
