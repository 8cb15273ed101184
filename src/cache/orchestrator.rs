//! Read-through refresh orchestrator
//!
//! Wraps one upstream client with a TTL cache persisted in the widget's own
//! settings. The payload, its fetch time and its cache key are written
//! together after every successful fetch. Failed fetches never touch the
//! cache: the last good payload is served as stale, and the next request
//! tries the upstream again.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{derive_cache_key, Clock};
use crate::data::UpstreamClient;
use crate::error::FetchError;
use crate::store::{Settings, SettingsStore, CACHED_DATA, CACHE_KEY, LAST_FETCHED, REFRESH_PERIOD};

/// How the returned data was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Fetched from the upstream during this call
    Fresh,
    /// Served from cache within its TTL
    Cached,
    /// Served from an expired cache because the upstream failed
    Stale,
}

impl Freshness {
    pub fn as_str(self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Cached => "cached",
            Freshness::Stale => "stale",
        }
    }
}

/// Widget payload with metadata about cache freshness
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetData {
    pub data: Value,
    /// Unix seconds of the fetch that produced `data`
    pub fetched_at: i64,
    pub freshness: Freshness,
}

/// Cache/refresh policy for one widget type
#[derive(Clone)]
pub struct Orchestrator {
    widget_type: &'static str,
    client: Arc<dyn UpstreamClient>,
    default_refresh_secs: i64,
    store: SettingsStore,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        widget_type: &'static str,
        client: Arc<dyn UpstreamClient>,
        default_refresh_secs: u64,
        store: SettingsStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            widget_type,
            client,
            default_refresh_secs: default_refresh_secs as i64,
            store,
            clock,
        }
    }

    pub fn client(&self) -> &Arc<dyn UpstreamClient> {
        &self.client
    }

    /// TTL for a widget: its `refresh_period` if a positive integer, else the default
    pub fn ttl(&self, settings: &Settings) -> i64 {
        settings
            .get_parsed::<i64>(REFRESH_PERIOD)
            .filter(|secs| *secs > 0)
            .unwrap_or(self.default_refresh_secs)
    }

    /// Cache key for the widget's current fetch-relevant settings
    pub fn cache_key(&self, settings: &Settings) -> String {
        derive_cache_key(self.widget_type, settings, self.client.fetch_keys())
    }

    /// Returns the cached payload if it parses and matches the current cache key
    fn usable_cache(&self, settings: &Settings, key: &str) -> Option<Value> {
        let raw = settings.get(CACHED_DATA)?;
        if settings.get(CACHE_KEY) != Some(key) {
            debug!(widget_type = self.widget_type, "cached data belongs to other settings");
            return None;
        }
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(widget_type = self.widget_type, error = %e, "cached data is invalid, ignoring");
                None
            }
        }
    }

    /// Returns data for a widget, from cache or from the upstream
    ///
    /// # Arguments
    /// * `widget_id` - Widget whose settings hold the cache entry
    /// * `settings` - The widget's full settings, cache entry included
    /// * `force` - Skip the TTL check and always call the upstream
    ///
    /// # Returns
    /// * `Ok(WidgetData)` - Fresh, cached, or stale data
    /// * `Err(FetchError)` - The upstream failed and no usable cache exists
    pub async fn get_data(
        &self,
        widget_id: i64,
        settings: &Settings,
        force: bool,
    ) -> Result<WidgetData, FetchError> {
        let now = self.clock.now();
        let ttl = self.ttl(settings);
        let last_fetched = settings.get_parsed::<i64>(LAST_FETCHED).unwrap_or(0);
        let age = now - last_fetched;
        let key = self.cache_key(settings);
        let cached = self.usable_cache(settings, &key);

        if !force {
            if let Some(data) = &cached {
                if age < ttl {
                    debug!(widget_id, age, ttl, "serving cached widget data");
                    return Ok(WidgetData {
                        data: data.clone(),
                        fetched_at: last_fetched,
                        freshness: Freshness::Cached,
                    });
                }
            }
        }

        match self.client.fetch(settings).await {
            Ok(fetched) => {
                let mut entry = fetched.derived;
                entry.insert(CACHED_DATA, fetched.data.to_string());
                entry.insert(LAST_FETCHED, now.to_string());
                entry.insert(CACHE_KEY, key);

                if let Err(e) = self.store.upsert_settings(widget_id, &entry) {
                    warn!(widget_id, error = %e, "failed to persist widget cache");
                }

                debug!(widget_id, widget_type = self.widget_type, force, "fetched fresh widget data");
                Ok(WidgetData {
                    data: fetched.data,
                    fetched_at: now,
                    freshness: Freshness::Fresh,
                })
            }
            Err(err) => match cached {
                Some(data) => {
                    warn!(widget_id, error = %err, "upstream failed, serving stale widget data");
                    Ok(WidgetData {
                        data,
                        fetched_at: last_fetched,
                        freshness: Freshness::Stale,
                    })
                }
                None => {
                    warn!(widget_id, error = %err, "upstream failed with no cached data");
                    Err(err)
                }
            },
        }
    }
}
