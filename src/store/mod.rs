//! Persistence for widgets and their settings
//!
//! Every widget owns a flat string-to-string settings mapping. User
//! configuration (location, count, refresh period) and cache state
//! (`cached_data`, `last_fetched`, `cache_key`) live side by side in that
//! mapping; the cache keys are written only by the refresh orchestrator.

mod sqlite;

pub use sqlite::SettingsStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Serialized payload of the last successful fetch
pub const CACHED_DATA: &str = "cached_data";
/// Unix seconds of the last successful fetch
pub const LAST_FETCHED: &str = "last_fetched";
/// Fetch identity the cached payload was produced for
pub const CACHE_KEY: &str = "cache_key";
/// Per-widget override of the refresh period, in seconds
pub const REFRESH_PERIOD: &str = "refresh_period";

/// Settings that only the refresh orchestrator may write
pub const CACHE_ENTRY_KEYS: [&str; 3] = [CACHED_DATA, LAST_FETCHED, CACHE_KEY];

/// Settings mapping for a single widget
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parses a setting, treating unparseable values as absent
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the settings without cache bookkeeping, as shown to users
    pub fn public(&self) -> Settings {
        self.iter()
            .filter(|(k, _)| !CACHE_ENTRY_KEYS.contains(k))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Settings(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A dashboard widget row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Widget {
    pub id: i64,
    /// Declared widget type tag, kept as stored so unknown types survive
    #[serde(rename = "type")]
    pub widget_type: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub z_index: i64,
    pub created_at: String,
}

/// Fields needed to create a widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWidget {
    pub widget_type: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl NewWidget {
    /// A widget of the given type at the origin with the default 2x2 size
    pub fn of_type(widget_type: impl Into<String>) -> Self {
        Self {
            widget_type: widget_type.into(),
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        }
    }
}

/// Partial update of a widget's grid placement
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LayoutUpdate {
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub z_index: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parsed_ignores_garbage() {
        let settings: Settings = [("count", "abc"), ("refresh_period", " 60 ")]
            .into_iter()
            .collect();

        assert_eq!(settings.get_parsed::<i64>("count"), None);
        assert_eq!(settings.get_parsed::<i64>("refresh_period"), Some(60));
        assert_eq!(settings.get_parsed::<i64>("missing"), None);
    }

    #[test]
    fn test_public_hides_cache_entry() {
        let settings: Settings = [
            ("location", "Paris"),
            (CACHED_DATA, "{}"),
            (LAST_FETCHED, "100"),
            (CACHE_KEY, "abc"),
        ]
        .into_iter()
        .collect();

        let public = settings.public();
        assert_eq!(public.len(), 1);
        assert_eq!(public.get("location"), Some("Paris"));
    }

    #[test]
    fn test_settings_serialize_as_flat_object() {
        let settings: Settings = [("units", "celsius")].into_iter().collect();
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json, serde_json::json!({ "units": "celsius" }));
    }
}
