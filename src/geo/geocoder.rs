use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::mission::GeoPoint;

/// Result of a reverse lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub state: String,
    pub zip: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Two-letter state abbreviation for a ZIP code.
    async fn state_for_zip(&self, zip: &str) -> Result<Option<String>, AppError>;

    async fn reverse(&self, point: &GeoPoint) -> Result<Option<Place>, AppError>;
}

/// Lookup faults surface as `AppError::Geocoding` whatever the backend reported.
pub fn geocoding_error(err: AppError) -> AppError {
    match err {
        AppError::Geocoding(_) => err,
        other => AppError::Geocoding(other.to_string()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZipRecord {
    pub zip: String,
    pub state: String,
    pub lat: f64,
    pub lng: f64,
}

/// Table-backed geocoder. Reverse lookups snap to the nearest ZIP centroid
/// within `max_distance_km`.
pub struct StaticGeocoder {
    records: Vec<ZipRecord>,
    by_zip: HashMap<String, usize>,
    max_distance_km: f64,
}

impl StaticGeocoder {
    pub fn new(records: Vec<ZipRecord>, max_distance_km: f64) -> Self {
        let by_zip = records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.zip.clone(), idx))
            .collect();

        Self {
            records,
            by_zip,
            max_distance_km,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>, max_distance_km: f64) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::Internal(format!("failed to read {}: {err}", path.display()))
        })?;
        let records: Vec<ZipRecord> = serde_json::from_str(&raw).map_err(|err| {
            AppError::Internal(format!("invalid geocoder table {}: {err}", path.display()))
        })?;

        Ok(Self::new(records, max_distance_km))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn state_for_zip(&self, zip: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .by_zip
            .get(zip.trim())
            .map(|&idx| self.records[idx].state.clone()))
    }

    async fn reverse(&self, point: &GeoPoint) -> Result<Option<Place>, AppError> {
        let nearest = self
            .records
            .iter()
            .map(|record| {
                let centroid = GeoPoint {
                    lat: record.lat,
                    lng: record.lng,
                };
                (record, haversine_km(point, &centroid))
            })
            .filter(|(_, distance)| *distance <= self.max_distance_km)
            .min_by(|a, b| a.1.total_cmp(&b.1));

        Ok(nearest.map(|(record, _)| Place {
            state: record.state.clone(),
            zip: record.zip.clone(),
        }))
    }
}
