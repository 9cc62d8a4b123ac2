use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub grpc_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub evidence_base_url: String,
    pub geocoder_table: Option<String>,
    pub geocoder_max_distance_km: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            grpc_port: parse_or_default("GRPC_PORT", 50051)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            evidence_base_url: env::var("EVIDENCE_BASE_URL")
                .unwrap_or_else(|_| "memory://evidence".to_string()),
            geocoder_table: env::var("GEOCODER_TABLE").ok(),
            geocoder_max_distance_km: parse_or_default("GEOCODER_MAX_DISTANCE_KM", 25.0)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
