//! Runtime configuration: API credentials, endpoints and request tuning.
//!
//! Values come from environment variables; anything missing falls back to
//! the defaults below. A service without credentials is simply skipped and
//! the synthetic generator takes over.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

pub const AVIATIONSTACK_API_URL: &str = "http://api.aviationstack.com/v1";
pub const AMADEUS_API_URL: &str = "https://test.api.amadeus.com/v1";
pub const WEATHER_API_URL: &str = "https://api.openweathermap.org/data/2.5";

pub const DEFAULT_CITY: &str = "Sydney";
pub const DEFAULT_DATE_RANGE_DAYS: u32 = 30;
pub const DATA_CACHE_DURATION_SECS: u64 = 3600;
pub const MAX_API_RETRIES: u32 = 3;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Retry behaviour shared by every outbound API call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub transport_delay: Duration,   // wait after a connection/timeout error
    pub max_backoff: Duration,       // cap for the 429 exponential backoff
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            transport_delay: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff after a 429: 2^attempt seconds, capped
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let exponential = Duration::from_secs(2u64.saturating_pow(attempt));
        exponential.min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_API_RETRIES,
            transport_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub aviationstack_api_key: Option<String>,
    pub amadeus_api_key: Option<String>,
    pub amadeus_api_secret: Option<String>,
    pub weather_api_key: Option<String>,
    pub aviationstack_url: String,
    pub amadeus_url: String,
    pub weather_url: String,
    pub default_city: String,
    pub default_days: u32,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aviationstack_api_key: None,
            amadeus_api_key: None,
            amadeus_api_secret: None,
            weather_api_key: None,
            aviationstack_url: AVIATIONSTACK_API_URL.to_string(),
            amadeus_url: AMADEUS_API_URL.to_string(),
            weather_url: WEATHER_API_URL.to_string(),
            default_city: DEFAULT_CITY.to_string(),
            default_days: DEFAULT_DATE_RANGE_DAYS,
            cache_ttl: Duration::from_secs(DATA_CACHE_DURATION_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();

        let cache_ttl = match var("DATA_CACHE_DURATION") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!(value = %raw, "Ignoring invalid DATA_CACHE_DURATION");
                    defaults.cache_ttl
                }
            },
            None => defaults.cache_ttl,
        };

        Self {
            aviationstack_api_key: var("AVIATIONSTACK_API_KEY"),
            amadeus_api_key: var("AMADEUS_API_KEY"),
            amadeus_api_secret: var("AMADEUS_API_SECRET"),
            weather_api_key: var("WEATHER_API_KEY"),
            aviationstack_url: var("AVIATIONSTACK_API_URL").unwrap_or(defaults.aviationstack_url),
            amadeus_url: var("AMADEUS_API_URL").unwrap_or(defaults.amadeus_url),
            weather_url: var("WEATHER_API_URL").unwrap_or(defaults.weather_url),
            cache_ttl,
            ..defaults
        }
    }

    pub fn has_aviationstack(&self) -> bool {
        self.aviationstack_api_key.is_some()
    }

    pub fn has_amadeus(&self) -> bool {
        self.amadeus_api_key.is_some() && self.amadeus_api_secret.is_some()
    }

    pub fn has_weather(&self) -> bool {
        self.weather_api_key.is_some()
    }

    /// Which services have credentials configured
    pub fn credential_status(&self) -> BTreeMap<&'static str, bool> {
        BTreeMap::from([
            ("aviationstack", self.has_aviationstack()),
            ("amadeus", self.has_amadeus()),
            ("weather", self.has_weather()),
        ])
    }
}
