use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::rank::Rank;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub rank: Rank,
    pub completed_missions_count: u32,
    pub uncompleted_missions_count: u32,
    pub failed_missions_count: u32,
    pub current_earnings: f64,
    pub zip_codes: BTreeSet<String>,
    pub states: BTreeSet<String>,
    pub miles_radius: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            rank: Rank::Recruit,
            completed_missions_count: 0,
            uncompleted_missions_count: 0,
            failed_missions_count: 0,
            current_earnings: 0.0,
            zip_codes: BTreeSet::new(),
            states: BTreeSet::new(),
            miles_radius: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub line1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub is_primary: bool,
}
