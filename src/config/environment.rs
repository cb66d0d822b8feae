use std::env;
use std::str::FromStr;

use crate::services::polling::{
    sink::DEFAULT_RESULT_BUFFER, validate_interval, AUTO_POLLING_STORAGE_KEY,
    DEFAULT_REFRESH_INTERVAL_SECS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Environment configuration
/// Loads and validates environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub search_api_url: String,
    pub search_timeout_secs: u64,
    pub redis_url: String,
    pub bind_addr: String,
    pub polling_state_key: String,
    pub default_interval_secs: u64,
    pub result_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let search_api_url =
            env::var("SEARCH_API_URL").map_err(|_| ConfigError::Missing("SEARCH_API_URL"))?;

        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let polling_state_key = env::var("POLLING_STATE_KEY")
            .unwrap_or_else(|_| AUTO_POLLING_STORAGE_KEY.to_string());

        let search_timeout_secs = parse_var("SEARCH_TIMEOUT_SECS", 30)?;
        let result_buffer = parse_var("RESULT_BUFFER", DEFAULT_RESULT_BUFFER)?;

        let default_interval_secs =
            parse_var("POLLING_DEFAULT_INTERVAL_SECS", DEFAULT_REFRESH_INTERVAL_SECS)?;
        if validate_interval(default_interval_secs).is_err() {
            return Err(ConfigError::Invalid {
                name: "POLLING_DEFAULT_INTERVAL_SECS",
                value: default_interval_secs.to_string(),
            });
        }

        Ok(Self {
            search_api_url,
            search_timeout_secs,
            redis_url,
            bind_addr,
            polling_state_key,
            default_interval_secs,
            result_buffer,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
