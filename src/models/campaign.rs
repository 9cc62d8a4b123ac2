use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertiser {
    pub id: Uuid,
    pub name: String,
    pub logo_url: Option<String>,
}

/// Eligibility is `nation`, `states` or `zip_codes`. Records normally set only
/// one of them but matching treats them as an inclusive OR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub advertiser_id: Uuid,
    pub name: String,
    pub nation: bool,
    pub states: Vec<String>,
    pub zip_codes: Vec<String>,
    pub bags_count: u32,
    pub remaining_bags: u32,
    pub start_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Nationwide campaigns and campaigns without any area are not fenced.
    pub fn is_geofenced(&self) -> bool {
        !self.nation && (!self.states.is_empty() || !self.zip_codes.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignListing {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub advertiser_name: String,
    pub advertiser_logo: Option<String>,
}
