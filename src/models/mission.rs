use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Active,
    Completed,
    Failed,
}

/// Delivery of a single bag. Leaves `Active` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverMission {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub driver_campaign_id: Uuid,
    pub campaign_id: Uuid,
    pub status: MissionStatus,
    pub pickup_location_name: Option<String>,
    pub recipient_name: Option<String>,
    pub start_mission: Option<GeoPoint>,
    pub end_mission: Option<GeoPoint>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
