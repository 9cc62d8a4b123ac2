use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::campaign::{Advertiser, Campaign};
use crate::models::driver::{Driver, ShippingAddress};
use crate::models::driver_campaign::DriverCampaign;
use crate::models::mission::DriverMission;

/// Document collections keyed by record id. Cross-collection references are
/// resolved by a second lookup; nothing here joins.
#[derive(Default)]
pub struct Store {
    pub drivers: DashMap<Uuid, Driver>,
    pub advertisers: DashMap<Uuid, Advertiser>,
    pub campaigns: DashMap<Uuid, Campaign>,
    pub driver_campaigns: DashMap<Uuid, DriverCampaign>,
    pub missions: DashMap<Uuid, DriverMission>,
    /// Keyed by driver id so a primary-address switch is one write.
    pub addresses: DashMap<Uuid, Vec<ShippingAddress>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(&self, id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))
    }

    pub fn campaign(&self, id: Uuid) -> Result<Campaign, AppError> {
        self.campaigns
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("campaign {id} not found")))
    }

    pub fn advertiser(&self, id: Uuid) -> Option<Advertiser> {
        self.advertisers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn driver_campaign(&self, id: Uuid) -> Result<DriverCampaign, AppError> {
        self.driver_campaigns
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver campaign {id} not found")))
    }

    pub fn mission(&self, id: Uuid) -> Result<DriverMission, AppError> {
        self.missions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("mission {id} not found")))
    }

    /// Runs `f` against the stored driver under its entry lock.
    pub fn update_driver<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Driver) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        let result = f(&mut *driver)?;
        driver.updated_at = Utc::now();
        Ok(result)
    }

    pub fn update_driver_campaign<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut DriverCampaign) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut driver_campaign = self
            .driver_campaigns
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver campaign {id} not found")))?;

        let result = f(&mut *driver_campaign)?;
        driver_campaign.updated_at = Utc::now();
        Ok(result)
    }

    pub fn update_mission<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut DriverMission) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut mission = self
            .missions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("mission {id} not found")))?;

        f(&mut *mission)
    }

    /// Conditional decrement of `remaining_bags`. Returns what is left.
    pub fn take_bags(&self, campaign_id: Uuid, bags: u32) -> Result<u32, AppError> {
        let mut campaign = self
            .campaigns
            .get_mut(&campaign_id)
            .ok_or_else(|| AppError::NotFound(format!("campaign {campaign_id} not found")))?;

        if campaign.remaining_bags < bags {
            return Err(AppError::InsufficientBags {
                requested: bags,
                remaining: campaign.remaining_bags,
            });
        }

        campaign.remaining_bags -= bags;
        Ok(campaign.remaining_bags)
    }

    pub fn addresses(&self, driver_id: Uuid) -> Vec<ShippingAddress> {
        self.addresses
            .get(&driver_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn primary_address(&self, driver_id: Uuid) -> Option<ShippingAddress> {
        self.addresses.get(&driver_id).and_then(|entry| {
            entry
                .value()
                .iter()
                .find(|address| address.is_primary)
                .cloned()
        })
    }

    /// The first address a driver saves becomes primary.
    pub fn add_address(&self, mut address: ShippingAddress) -> ShippingAddress {
        let mut addresses = self.addresses.entry(address.driver_id).or_default();
        address.is_primary = !addresses.iter().any(|existing| existing.is_primary);
        addresses.push(address.clone());
        address
    }

    /// Flags `address_id` as primary and clears every other address of the
    /// driver in the same write. Nothing changes if the address is unknown.
    pub fn set_primary_address(
        &self,
        driver_id: Uuid,
        address_id: Uuid,
    ) -> Result<Vec<ShippingAddress>, AppError> {
        let mut addresses = self
            .addresses
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("address {address_id} not found")))?;

        if !addresses.iter().any(|address| address.id == address_id) {
            return Err(AppError::NotFound(format!("address {address_id} not found")));
        }

        for address in addresses.iter_mut() {
            address.is_primary = address.id == address_id;
        }

        Ok(addresses.clone())
    }

    pub fn driver_campaigns_for_driver(&self, driver_id: Uuid) -> Vec<DriverCampaign> {
        let mut claims: Vec<DriverCampaign> = self
            .driver_campaigns
            .iter()
            .filter(|entry| entry.value().driver_id == driver_id)
            .map(|entry| entry.value().clone())
            .collect();
        claims.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        claims
    }

    pub fn missions_for_driver_campaign(&self, driver_campaign_id: Uuid) -> Vec<DriverMission> {
        let mut missions: Vec<DriverMission> = self
            .missions
            .iter()
            .filter(|entry| entry.value().driver_campaign_id == driver_campaign_id)
            .map(|entry| entry.value().clone())
            .collect();
        missions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        missions
    }

    /// A driver's missions, newest first, at most `limit` of them.
    pub fn recent_missions(&self, driver_id: Uuid, limit: usize) -> Vec<DriverMission> {
        let mut missions: Vec<DriverMission> = self
            .missions
            .iter()
            .filter(|entry| entry.value().driver_id == driver_id)
            .map(|entry| entry.value().clone())
            .collect();
        missions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        missions.truncate(limit);
        missions
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::Store;
    use crate::error::AppError;
    use crate::models::campaign::Campaign;
    use crate::models::driver::ShippingAddress;

    fn address(driver_id: Uuid, line1: &str) -> ShippingAddress {
        ShippingAddress {
            id: Uuid::new_v4(),
            driver_id,
            line1: line1.to_string(),
            city: "Brooklyn".to_string(),
            state: "NY".to_string(),
            zip: "11201".to_string(),
            is_primary: false,
        }
    }

    #[test]
    fn first_address_becomes_primary_and_switch_keeps_exactly_one() {
        let store = Store::new();
        let driver_id = Uuid::new_v4();

        let first = store.add_address(address(driver_id, "1 Main St"));
        let second = store.add_address(address(driver_id, "2 Main St"));
        assert!(first.is_primary);
        assert!(!second.is_primary);

        let addresses = store.set_primary_address(driver_id, second.id).unwrap();
        let primaries: Vec<_> = addresses.iter().filter(|a| a.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].id, second.id);
        assert_eq!(store.primary_address(driver_id).unwrap().id, second.id);
    }

    #[test]
    fn unknown_primary_address_changes_nothing() {
        let store = Store::new();
        let driver_id = Uuid::new_v4();
        let first = store.add_address(address(driver_id, "1 Main St"));

        let result = store.set_primary_address(driver_id, Uuid::new_v4());
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.primary_address(driver_id).unwrap().id, first.id);
    }

    #[test]
    fn take_bags_refuses_to_go_negative() {
        let store = Store::new();
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            advertiser_id: Uuid::new_v4(),
            name: "Spring".to_string(),
            nation: true,
            states: vec![],
            zip_codes: vec![],
            bags_count: 100,
            remaining_bags: 30,
            start_date: now,
            created_at: now,
        };
        store.campaigns.insert(campaign.id, campaign.clone());

        assert_eq!(store.take_bags(campaign.id, 25).unwrap(), 5);
        assert!(matches!(
            store.take_bags(campaign.id, 25),
            Err(AppError::InsufficientBags {
                requested: 25,
                remaining: 5
            })
        ));
        assert_eq!(store.campaign(campaign.id).unwrap().remaining_bags, 5);
    }
}
