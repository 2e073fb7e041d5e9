//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

use garden_core::services::DEFAULT_MIN_SCORE;

pub const DEFAULT_PLANTNET_URL: &str = "https://my-api.plantnet.org";
pub const DEFAULT_FCM_URL: &str = "https://fcm.googleapis.com";
pub const DEFAULT_HEALTH_JOB_INTERVAL_SECS: u64 = 60 * 60;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub description_model: String,
    pub plantnet_api_key: Option<String>,
    pub plantnet_url: String,
    pub identification_min_score: f64,
    pub fcm_url: String,
    pub fcm_project_id: Option<String>,
    /// OAuth2 bearer token for FCM, used as-is for the life of the process.
    /// Google issues these for about an hour and the server never refreshes
    /// it, so a long-running deployment must restart with a fresh token.
    /// Once it expires every push fails with 401 and is logged, while the
    /// rest of the API keeps working.
    pub fcm_access_token: Option<String>,
    pub health_job_interval: Duration,
    pub cors_origin: String,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let plantnet_api_key = std::env::var("PLANTNET_API_KEY").ok();
        let fcm_project_id = std::env::var("FCM_PROJECT_ID").ok();
        let fcm_access_token = std::env::var("FCM_ACCESS_TOKEN").ok();

        // --- Load Adapter-specific Settings ---
        let description_model =
            std::env::var("DESCRIPTION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let plantnet_url =
            std::env::var("PLANTNET_URL").unwrap_or_else(|_| DEFAULT_PLANTNET_URL.to_string());
        let fcm_url = std::env::var("FCM_URL").unwrap_or_else(|_| DEFAULT_FCM_URL.to_string());

        let identification_min_score = parse_var("IDENTIFICATION_MIN_SCORE", DEFAULT_MIN_SCORE)?;
        if !(0.0..=1.0).contains(&identification_min_score) {
            return Err(ConfigError::InvalidValue(
                "IDENTIFICATION_MIN_SCORE".to_string(),
                format!("{} is not within [0, 1]", identification_min_score),
            ));
        }

        let interval_secs =
            parse_var("HEALTH_JOB_INTERVAL_SECS", DEFAULT_HEALTH_JOB_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "HEALTH_JOB_INTERVAL_SECS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            description_model,
            plantnet_api_key,
            plantnet_url,
            identification_min_score,
            fcm_url,
            fcm_project_id,
            fcm_access_token,
            health_job_interval: Duration::from_secs(interval_secs),
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let value = parse_var("MYGARDEN_TEST_UNSET_VARIABLE", 42u64).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn set_variables_are_parsed_and_validated() {
        std::env::set_var("MYGARDEN_TEST_SCORE", " 0.45 ");
        let score = parse_var("MYGARDEN_TEST_SCORE", 0.3f64).unwrap();
        assert!((score - 0.45).abs() < f64::EPSILON);

        std::env::set_var("MYGARDEN_TEST_INTERVAL", "hourly");
        let err = parse_var("MYGARDEN_TEST_INTERVAL", 3600u64).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "MYGARDEN_TEST_INTERVAL"));
    }
}
