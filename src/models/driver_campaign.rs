use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::ShippingAddress;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriverCampaignStatus {
    Requested,
    Active,
    #[serde(rename = "on the way")]
    OnTheWay,
    Completed,
}

impl DriverCampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverCampaignStatus::Requested => "requested",
            DriverCampaignStatus::Active => "active",
            DriverCampaignStatus::OnTheWay => "on the way",
            DriverCampaignStatus::Completed => "completed",
        }
    }

    /// Claimed but not yet activated by a campaign scan.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            DriverCampaignStatus::Requested | DriverCampaignStatus::OnTheWay
        )
    }
}

/// A driver's claim against a campaign: one batch of bags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverCampaign {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub campaign_id: Uuid,
    pub bags_count: u32,
    pub bags_delivered: u32,
    pub bags_failed: u32,
    pub status: DriverCampaignStatus,
    pub potential_earnings: f64,
    pub current_earnings: f64,
    pub shipping_address: Option<ShippingAddress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriverCampaign {
    /// Bags neither delivered nor written off.
    pub fn outstanding_bags(&self) -> u32 {
        self.bags_count
            .saturating_sub(self.bags_delivered)
            .saturating_sub(self.bags_failed)
    }
}
