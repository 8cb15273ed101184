//! Upstream clients for each widget type
//!
//! Every client turns a widget's settings into one fresh round trip to its
//! provider. Clients never cache; the refresh orchestrator in
//! [`crate::cache`] decides when to call them.

pub mod aggregator;
pub mod headlines;
pub mod pull_requests;
pub mod weather;

pub use aggregator::{time_ago, AggregatorClient, Post, AGGREGATOR_BASE_URL};
pub use headlines::{HeadlineClient, Story, HACKER_NEWS_BASE_URL};
pub use pull_requests::{CommandOutput, CommandRunner, ProcessRunner, PrStatus, PrStatusClient};
pub use weather::{
    weather_code_to_condition, WeatherClient, WeatherCondition, WeatherReport, GEOCODING_BASE_URL,
    OPEN_METEO_BASE_URL,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::FetchError;
use crate::store::Settings;

/// Result of a successful upstream fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    /// Normalized widget payload
    pub data: Value,
    /// Settings resolved during the fetch that should be persisted with it
    pub derived: Settings,
}

impl Fetched {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            derived: Settings::new(),
        }
    }

    /// Serializes a typed payload
    pub fn from_serialize<T: Serialize>(data: &T) -> Result<Self, FetchError> {
        serde_json::to_value(data)
            .map(Self::new)
            .map_err(|e| FetchError::UpstreamError(format!("Failed to encode widget data: {}", e)))
    }

    pub fn with_derived(mut self, key: &str, value: impl Into<String>) -> Self {
        self.derived.insert(key, value);
        self
    }
}

/// A remote data source for one widget type
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Fetches fresh data for a widget with the given settings
    async fn fetch(&self, settings: &Settings) -> Result<Fetched, FetchError>;

    /// Settings that determine what `fetch` returns
    ///
    /// A change to any of these invalidates the widget's cached data.
    fn fetch_keys(&self) -> &'static [&'static str];

    /// Derived settings written by `fetch` that go stale with the cache
    fn derived_keys(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Builds the HTTP client shared by all upstream clients
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("deskboard/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Reads an item count setting, clamped to `[min, max]`
///
/// Missing, zero or non-numeric values fall back to `default`.
pub fn clamp_count(settings: &Settings, min: usize, max: usize, default: usize) -> usize {
    settings
        .get_parsed::<i64>("count")
        .filter(|n| *n != 0)
        .map(|n| n.clamp(min as i64, max as i64) as usize)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_count(value: &str) -> Settings {
        [("count", value)].into_iter().collect()
    }

    #[test]
    fn test_clamp_count_bounds() {
        assert_eq!(clamp_count(&with_count("2"), 5, 25, 10), 5);
        assert_eq!(clamp_count(&with_count("100"), 5, 25, 10), 25);
        assert_eq!(clamp_count(&with_count("15"), 5, 25, 10), 15);
        assert_eq!(clamp_count(&with_count("-3"), 5, 20, 10), 5);
    }

    #[test]
    fn test_clamp_count_defaults() {
        assert_eq!(clamp_count(&Settings::new(), 5, 25, 10), 10);
        assert_eq!(clamp_count(&with_count("lots"), 5, 25, 10), 10);
        assert_eq!(clamp_count(&with_count("0"), 5, 25, 10), 10);
    }

    #[test]
    fn test_fetched_with_derived() {
        let fetched = Fetched::new(Value::Null).with_derived("latitude", "1.5");
        assert_eq!(fetched.derived.get("latitude"), Some("1.5"));
    }
}
