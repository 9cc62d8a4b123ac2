use std::collections::BTreeSet;

use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::campaign::{Campaign, CampaignListing};
use crate::state::AppState;

pub fn matches(campaign: &Campaign, zip_codes: &BTreeSet<String>, states: &BTreeSet<String>) -> bool {
    campaign.nation
        || campaign.zip_codes.iter().any(|zip| zip_codes.contains(zip))
        || campaign.states.iter().any(|state| states.contains(state))
}

/// Protocol-relative logo URLs (`//host/path`) are served over https.
pub fn normalize_logo_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// Campaigns visible to the driver, newest start date first.
pub fn matching_campaigns(state: &AppState, driver_id: Uuid) -> Result<Vec<CampaignListing>, AppError> {
    let driver = state.store.driver(driver_id)?;

    let mut candidates: Vec<Campaign> = state
        .store
        .campaigns
        .iter()
        .filter(|entry| matches(entry.value(), &driver.zip_codes, &driver.states))
        .map(|entry| entry.value().clone())
        .collect();
    candidates.sort_by(|a, b| b.start_date.cmp(&a.start_date));

    let listings = candidates
        .into_iter()
        .filter_map(|campaign| {
            let Some(advertiser) = state.store.advertiser(campaign.advertiser_id) else {
                warn!(
                    campaign_id = %campaign.id,
                    advertiser_id = %campaign.advertiser_id,
                    "advertiser missing; skipping campaign"
                );
                return None;
            };

            Some(CampaignListing {
                advertiser_name: advertiser.name,
                advertiser_logo: advertiser.logo_url.as_deref().map(normalize_logo_url),
                campaign,
            })
        })
        .collect();

    Ok(listings)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{matches, matching_campaigns, normalize_logo_url};
    use crate::models::campaign::{Advertiser, Campaign};
    use crate::models::driver::Driver;
    use crate::state::AppState;

    fn campaign(nation: bool, states: &[&str], zip_codes: &[&str]) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            advertiser_id: Uuid::new_v4(),
            name: "test-campaign".to_string(),
            nation,
            states: states.iter().map(|s| s.to_string()).collect(),
            zip_codes: zip_codes.iter().map(|z| z.to_string()).collect(),
            bags_count: 500,
            remaining_bags: 500,
            start_date: Utc::now(),
            created_at: Utc::now(),
        }
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn state_overlap_matches() {
        let ny = campaign(false, &["NY"], &[]);
        assert!(matches(&ny, &set(&[]), &set(&["NY", "NJ"])));
        assert!(!matches(&ny, &set(&[]), &set(&["CA"])));
    }

    #[test]
    fn zip_overlap_matches() {
        let brooklyn = campaign(false, &[], &["11201"]);
        assert!(matches(&brooklyn, &set(&["11201", "11215"]), &set(&[])));
        assert!(!matches(&brooklyn, &set(&["10001"]), &set(&["NY"])));
    }

    #[test]
    fn nationwide_matches_everyone() {
        let everywhere = campaign(true, &[], &[]);
        assert!(matches(&everywhere, &set(&[]), &set(&[])));
    }

    #[test]
    fn criteria_are_or_combined() {
        let mixed = campaign(false, &["TX"], &["11201"]);
        assert!(matches(&mixed, &set(&["11201"]), &set(&["NY"])));
        assert!(matches(&mixed, &set(&["73301"]), &set(&["TX"])));
    }

    #[test]
    fn protocol_relative_logo_becomes_https() {
        assert_eq!(
            normalize_logo_url("//cdn.example.com/logo.png"),
            "https://cdn.example.com/logo.png"
        );
        assert_eq!(
            normalize_logo_url("https://cdn.example.com/logo.png"),
            "https://cdn.example.com/logo.png"
        );
    }

    #[test]
    fn listing_is_newest_first_and_skips_orphans() {
        let state = AppState::in_memory(16);

        let mut driver = Driver::new("Dana".to_string());
        driver.states = set(&["NY"]);
        state.store.drivers.insert(driver.id, driver.clone());

        let advertiser = Advertiser {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            logo_url: Some("//cdn.acme.test/logo.png".to_string()),
        };
        state.store.advertisers.insert(advertiser.id, advertiser.clone());

        let mut older = campaign(false, &["NY"], &[]);
        older.advertiser_id = advertiser.id;
        older.start_date = Utc::now() - Duration::days(3);
        let mut newer = campaign(true, &[], &[]);
        newer.advertiser_id = advertiser.id;
        let orphan = campaign(true, &[], &[]);
        let elsewhere = campaign(false, &["CA"], &[]);

        for c in [&older, &newer, &orphan, &elsewhere] {
            state.store.campaigns.insert(c.id, c.clone());
        }

        let listings = matching_campaigns(&state, driver.id).unwrap();
        let ids: Vec<Uuid> = listings.iter().map(|l| l.campaign.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert_eq!(listings[0].advertiser_name, "Acme");
        assert_eq!(
            listings[0].advertiser_logo.as_deref(),
            Some("https://cdn.acme.test/logo.png")
        );
    }
}
