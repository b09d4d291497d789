use crate::error::{env_error, CalResult, Error};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::str::FromStr;
use toml;

/// Default bounded timeout for backend requests, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// First day of the canonical week used by the weekly view.
///
/// The convention is an explicit configuration value, never inherited
/// from a date library default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Monday,
    Sunday,
}

impl Default for WeekStart {
    fn default() -> Self {
        WeekStart::Monday
    }
}

impl FromStr for WeekStart {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monday" => Ok(WeekStart::Monday),
            "sunday" => Ok(WeekStart::Sunday),
            other => Err(Error::Config(format!(
                "Invalid WEEK_START value: {} (expected 'monday' or 'sunday')",
                other
            ))),
        }
    }
}

/// Main configuration structure for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote event backend
    pub api_base_url: String,
    /// Bearer token sent on every backend request
    pub api_token: String,
    /// Timezone used to resolve "today" for the initial anchor date
    pub timezone: String,
    /// First day of the canonical week for the weekly view
    pub week_start: WeekStart,
    /// Bounded timeout for each backend request, in seconds
    pub request_timeout_secs: u64,
    /// Map of component names to their enabled status
    pub components: HashMap<String, bool>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> CalResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        // Required environment variables
        let api_base_url = env::var("EVENT_API_URL").map_err(|_| env_error("EVENT_API_URL"))?;
        let api_token = env::var("EVENT_API_TOKEN").map_err(|_| env_error("EVENT_API_TOKEN"))?;

        // Default timezone
        let timezone = env::var("TIMEZONE").unwrap_or_else(|_| String::from("UTC"));

        // Week-start convention for the weekly view
        let week_start = match env::var("WEEK_START") {
            Ok(value) => WeekStart::from_str(&value)?,
            Err(_) => WeekStart::default(),
        };

        let request_timeout_secs = match env::var("REQUEST_TIMEOUT_SECS") {
            Ok(value) => value.parse::<u64>().map_err(|_| {
                Error::Config(format!("Invalid REQUEST_TIMEOUT_SECS value: {}", value))
            })?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        // Initialize default components
        let mut components = HashMap::new();
        components.insert("agenda".to_string(), true);

        // Load components configuration from file if it exists
        if let Ok(content) = fs::read_to_string("config/components.toml") {
            if let Ok(file_components) = toml::from_str::<HashMap<String, bool>>(&content) {
                // Merge with defaults
                for (key, value) in file_components {
                    components.insert(key, value);
                }
            }
        }

        Ok(Config {
            api_base_url,
            api_token,
            timezone,
            week_start,
            request_timeout_secs,
            components,
        })
    }

    /// Check if a component is enabled
    pub fn is_component_enabled(&self, name: &str) -> bool {
        *self.components.get(name).unwrap_or(&false)
    }
}
