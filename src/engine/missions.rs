use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::progression::{ProgressUpdate, apply_mission_completion};
use crate::engine::scan::{ScanPayload, parse};
use crate::error::AppError;
use crate::geo::geocoder::{Place, geocoding_error};
use crate::models::campaign::Campaign;
use crate::models::driver_campaign::DriverCampaignStatus;
use crate::models::event::ProgressEvent;
use crate::models::mission::{DriverMission, GeoPoint, MissionStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct StartMission {
    pub driver_id: Uuid,
    pub qr_payload: String,
    pub pickup_location_name: String,
    pub recipient_name: String,
    pub location: GeoPoint,
}

pub struct CompleteMission<'a> {
    pub driver_id: Uuid,
    pub location: GeoPoint,
    pub photo: &'a [u8],
    pub content_type: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissionCompletion {
    pub mission: DriverMission,
    pub progress: ProgressUpdate,
}

/// Whether a drop-off place lies inside a fenced campaign's area.
pub fn within_campaign_area(campaign: &Campaign, place: Option<&Place>) -> bool {
    if !campaign.is_geofenced() {
        return true;
    }

    let Some(place) = place else {
        return false;
    };

    campaign
        .states
        .iter()
        .any(|state| state.eq_ignore_ascii_case(&place.state))
        || campaign.zip_codes.iter().any(|zip| zip == &place.zip)
}

pub fn start_mission(
    state: &AppState,
    driver_campaign_id: Uuid,
    request: StartMission,
) -> Result<DriverMission, AppError> {
    let pickup_location_name = request.pickup_location_name.trim();
    let recipient_name = request.recipient_name.trim();
    if pickup_location_name.is_empty() {
        return Err(AppError::BadRequest("pickup location name cannot be empty".to_string()));
    }
    if recipient_name.is_empty() {
        return Err(AppError::BadRequest("recipient name cannot be empty".to_string()));
    }

    let driver_campaign = state.store.driver_campaign(driver_campaign_id)?;
    if driver_campaign.driver_id != request.driver_id {
        return Err(AppError::Conflict(format!(
            "driver campaign {driver_campaign_id} belongs to another driver"
        )));
    }
    if driver_campaign.status != DriverCampaignStatus::Active {
        return Err(AppError::Conflict(format!(
            "driver campaign {driver_campaign_id} is {}, not active",
            driver_campaign.status.as_str()
        )));
    }

    match parse(&request.qr_payload)? {
        ScanPayload::Campaign(campaign_id) if campaign_id == driver_campaign.campaign_id => {}
        _ => {
            return Err(AppError::BadRequest(
                "QR code does not belong to this campaign".to_string(),
            ));
        }
    }

    let in_flight = state
        .store
        .missions_for_driver_campaign(driver_campaign_id)
        .iter()
        .filter(|mission| mission.status != MissionStatus::Failed)
        .count();
    if in_flight >= driver_campaign.bags_count as usize {
        return Err(AppError::Conflict(format!(
            "every bag of driver campaign {driver_campaign_id} already has a mission"
        )));
    }

    let now = Utc::now();
    let mission = DriverMission {
        id: Uuid::new_v4(),
        driver_id: request.driver_id,
        driver_campaign_id,
        campaign_id: driver_campaign.campaign_id,
        status: MissionStatus::Active,
        pickup_location_name: Some(pickup_location_name.to_string()),
        recipient_name: Some(recipient_name.to_string()),
        start_mission: Some(request.location),
        end_mission: None,
        photo_url: None,
        created_at: now,
        finished_at: None,
    };

    state.store.missions.insert(mission.id, mission.clone());
    state.metrics.active_missions.inc();

    info!(
        driver_id = %mission.driver_id,
        mission_id = %mission.id,
        driver_campaign_id = %driver_campaign_id,
        "mission started"
    );
    state.publish(ProgressEvent::MissionStarted {
        driver_id: mission.driver_id,
        mission_id: mission.id,
        driver_campaign_id,
        at: now,
    });

    Ok(mission)
}

pub async fn complete_mission(
    state: &AppState,
    mission_id: Uuid,
    request: CompleteMission<'_>,
) -> Result<MissionCompletion, AppError> {
    let start = Instant::now();
    let result = finish_mission(state, mission_id, request).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(AppError::GeofenceMismatch) => "geofence",
        Err(AppError::Upload(_)) => "upload",
        Err(AppError::Geocoding(_)) => "geocoding",
        Err(_) => "error",
    };
    state
        .metrics
        .mission_completion_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .mission_completions_total
        .with_label_values(&[outcome])
        .inc();

    result
}

async fn finish_mission(
    state: &AppState,
    mission_id: Uuid,
    request: CompleteMission<'_>,
) -> Result<MissionCompletion, AppError> {
    let mission = state.store.mission(mission_id)?;
    ensure_owner(&mission, request.driver_id)?;
    if mission.status != MissionStatus::Active {
        return Err(AppError::Conflict(format!("mission {mission_id} is already finished")));
    }

    let key = format!("missions/{mission_id}/{}", evidence_file_name(request.content_type));
    let photo_url = state
        .storage
        .upload(&key, request.content_type, request.photo)
        .await
        .map_err(|err| {
            error!(mission_id = %mission_id, error = %err, "evidence upload failed");
            match err {
                AppError::Upload(_) => err,
                other => AppError::Upload(other.to_string()),
            }
        })?;

    let campaign = state.store.campaign(mission.campaign_id)?;
    if campaign.is_geofenced() {
        let place = state.geocoder.reverse(&request.location).await.map_err(|err| {
            error!(mission_id = %mission_id, error = %err, "reverse geocoding failed");
            geocoding_error(err)
        })?;

        if !within_campaign_area(&campaign, place.as_ref()) {
            warn!(
                mission_id = %mission_id,
                campaign_id = %campaign.id,
                lat = request.location.lat,
                lng = request.location.lng,
                "drop-off outside campaign area"
            );
            return Err(AppError::GeofenceMismatch);
        }
    }

    let now = Utc::now();
    let (mission, progress) = apply_mission_completion(state, mission_id, |mission| {
        // Ownership may have moved through a reassignment since the first read.
        ensure_owner(mission, request.driver_id)?;
        mission.end_mission = Some(request.location);
        mission.photo_url = Some(photo_url);
        mission.finished_at = Some(now);
        Ok(())
    })?;
    state.metrics.active_missions.dec();

    info!(
        driver_id = %mission.driver_id,
        mission_id = %mission.id,
        bags_delivered = progress.driver_campaign.bags_delivered,
        earnings_delta = progress.earnings_delta,
        "mission completed"
    );
    state.publish(ProgressEvent::MissionCompleted {
        driver_id: mission.driver_id,
        mission_id: mission.id,
        driver_campaign_id: mission.driver_campaign_id,
        bags_delivered: progress.driver_campaign.bags_delivered,
        earnings_delta: progress.earnings_delta,
        at: now,
    });

    Ok(MissionCompletion { mission, progress })
}

fn ensure_owner(mission: &DriverMission, driver_id: Uuid) -> Result<(), AppError> {
    if mission.driver_id != driver_id {
        return Err(AppError::Conflict(format!(
            "mission {} belongs to another driver",
            mission.id
        )));
    }
    Ok(())
}

fn evidence_file_name(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "dropoff.png",
        "image/heic" => "dropoff.heic",
        _ => "dropoff.jpg",
    }
}
