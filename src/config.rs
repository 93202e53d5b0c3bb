use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: String,
    pub event_buffer_size: usize,
    pub dispatch_queue_size: usize,
    pub in_memory_collaborators: bool,
    pub dispatch: DispatchSettings,
    pub collaborators: CollaboratorUrls,
}

/// Tunables of the dispatch core.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub radius_km: f64,
    pub proximity_alert_km: f64,
    pub collaborator_timeout: Duration,
    pub retry_delay: Duration,
    pub max_attempts: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            proximity_alert_km: 0.5,
            collaborator_timeout: Duration::from_millis(3_000),
            retry_delay: Duration::from_millis(2_000),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollaboratorUrls {
    pub order_service: String,
    pub restaurant_service: String,
    pub user_service: String,
    pub notification_service: String,
    pub service_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let dispatch = DispatchSettings {
            radius_km: parse_or_default("DISPATCH_RADIUS_KM", 10.0)?,
            proximity_alert_km: parse_or_default("PROXIMITY_ALERT_KM", 0.5)?,
            collaborator_timeout: Duration::from_millis(parse_or_default(
                "COLLABORATOR_TIMEOUT_MS",
                3_000,
            )?),
            retry_delay: Duration::from_millis(parse_or_default("DISPATCH_RETRY_DELAY_MS", 2_000)?),
            max_attempts: parse_or_default("DISPATCH_MAX_ATTEMPTS", 5)?,
        };

        if dispatch.radius_km <= 0.0 || dispatch.proximity_alert_km <= 0.0 {
            return Err(AppError::Internal(
                "DISPATCH_RADIUS_KM and PROXIMITY_ALERT_KM must be positive".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3003)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            dispatch_queue_size: parse_or_default("DISPATCH_QUEUE_SIZE", 1024)?,
            in_memory_collaborators: parse_or_default("IN_MEMORY_COLLABORATORS", false)?,
            dispatch,
            collaborators: CollaboratorUrls {
                order_service: url_or_default("ORDER_SERVICE_URL", "http://localhost:3002/api/orders"),
                restaurant_service: url_or_default(
                    "RESTAURANT_SERVICE_URL",
                    "http://localhost:3001/api/restaurants",
                ),
                user_service: url_or_default("USER_SERVICE_URL", "http://localhost:3000/api/user"),
                notification_service: url_or_default(
                    "NOTIFICATION_SERVICE_URL",
                    "http://localhost:3006/api/notifications",
                ),
                service_token: env::var("SERVICE_TOKEN").ok().filter(|t| !t.is_empty()),
            },
        })
    }
}

fn url_or_default(key: &str, default: &str) -> String {
    env::var(key)
        .map(|raw| raw.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| default.to_string())
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
