//! Environment-driven configuration for the location services.

use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{debug, warn};

use super::{
    directory_api::DEFAULT_LOCATIONS_API_URL, geocoding::DEFAULT_NOMINATIM_URL,
    location_directory::DEFAULT_CACHE_TTL, request_queue::RequestQueue,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://locations.db";
const DEFAULT_USER_AGENT: &str = concat!("vn-locations/", env!("CARGO_PKG_VERSION"));
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct LocationConfig {
    pub database_url: String,
    pub nominatim_url: String,
    pub locations_api_url: String,
    pub user_agent: String,
    pub queue_interval: Duration,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            locations_api_url: DEFAULT_LOCATIONS_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            queue_interval: RequestQueue::DEFAULT_INTERVAL,
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl LocationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let days = defaults.cache_ttl.as_secs() / SECS_PER_DAY;

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            nominatim_url: lookup("NOMINATIM_URL").unwrap_or(defaults.nominatim_url),
            locations_api_url: lookup("LOCATIONS_API_URL").unwrap_or(defaults.locations_api_url),
            user_agent: lookup("LOCATION_USER_AGENT").unwrap_or(defaults.user_agent),
            queue_interval: Duration::from_millis(parse_or(
                &lookup,
                "LOCATION_QUEUE_INTERVAL_MS",
                defaults.queue_interval.as_millis() as u64,
            )),
            cache_ttl: Duration::from_secs(
                parse_or(&lookup, "LOCATION_CACHE_TTL_DAYS", days).saturating_mul(SECS_PER_DAY),
            ),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "LOCATION_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
        }
    }
}

/// Parse `key` from `lookup`, keeping `default` when it is unset or invalid.
pub fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => {
            debug!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = LocationConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, LocationConfig::default());
        assert_eq!(config.cache_ttl, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.queue_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_overrides() {
        let config = LocationConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("LOCATION_QUEUE_INTERVAL_MS", "250"),
            ("LOCATION_CACHE_TTL_DAYS", "1"),
        ]));
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.queue_interval, Duration::from_millis(250));
        assert_eq!(config.cache_ttl, Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_invalid_value_keeps_default() {
        let config =
            LocationConfig::from_lookup(lookup_from(&[("LOCATION_QUEUE_INTERVAL_MS", "soon")]));
        assert_eq!(config.queue_interval, RequestQueue::DEFAULT_INTERVAL);
    }

    #[test]
    fn test_huge_cache_ttl_saturates() {
        let config = LocationConfig::from_lookup(lookup_from(&[(
            "LOCATION_CACHE_TTL_DAYS",
            "18446744073709551615",
        )]));
        assert_eq!(config.cache_ttl, Duration::from_secs(u64::MAX));
    }
}
