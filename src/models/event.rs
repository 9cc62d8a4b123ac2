use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::rank::Rank;

/// Pushed to subscribers after a mutation has been written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    BagsClaimed {
        driver_id: Uuid,
        driver_campaign_id: Uuid,
        campaign_id: Uuid,
        bags: u32,
        remaining_bags: u32,
        at: DateTime<Utc>,
    },
    ClaimActivated {
        driver_id: Uuid,
        driver_campaign_id: Uuid,
        at: DateTime<Utc>,
    },
    ClaimReassigned {
        driver_id: Uuid,
        previous_driver_id: Uuid,
        driver_campaign_id: Uuid,
        at: DateTime<Utc>,
    },
    MissionStarted {
        driver_id: Uuid,
        mission_id: Uuid,
        driver_campaign_id: Uuid,
        at: DateTime<Utc>,
    },
    MissionCompleted {
        driver_id: Uuid,
        mission_id: Uuid,
        driver_campaign_id: Uuid,
        bags_delivered: u32,
        earnings_delta: f64,
        at: DateTime<Utc>,
    },
    CampaignCompleted {
        driver_id: Uuid,
        driver_campaign_id: Uuid,
        bags_delivered: u32,
        bags_failed: u32,
        at: DateTime<Utc>,
    },
    RankPromoted {
        driver_id: Uuid,
        from: Rank,
        to: Rank,
        at: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn driver_id(&self) -> Uuid {
        match self {
            ProgressEvent::BagsClaimed { driver_id, .. }
            | ProgressEvent::ClaimActivated { driver_id, .. }
            | ProgressEvent::ClaimReassigned { driver_id, .. }
            | ProgressEvent::MissionStarted { driver_id, .. }
            | ProgressEvent::MissionCompleted { driver_id, .. }
            | ProgressEvent::CampaignCompleted { driver_id, .. }
            | ProgressEvent::RankPromoted { driver_id, .. } => *driver_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::BagsClaimed { .. } => "bags_claimed",
            ProgressEvent::ClaimActivated { .. } => "claim_activated",
            ProgressEvent::ClaimReassigned { .. } => "claim_reassigned",
            ProgressEvent::MissionStarted { .. } => "mission_started",
            ProgressEvent::MissionCompleted { .. } => "mission_completed",
            ProgressEvent::CampaignCompleted { .. } => "campaign_completed",
            ProgressEvent::RankPromoted { .. } => "rank_promoted",
        }
    }
}
