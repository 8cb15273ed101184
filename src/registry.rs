//! Widget registry and dispatcher
//!
//! Maps each widget type to its refresh orchestrator and exposes the
//! operations the HTTP boundary needs: widget lifecycle, settings updates
//! with cache invalidation, and "get data for widget N".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{Clock, Orchestrator, WidgetData};
use crate::data::UpstreamClient;
use crate::error::WidgetError;
use crate::store::{
    LayoutUpdate, NewWidget, Settings, SettingsStore, Widget, CACHE_ENTRY_KEYS,
};

/// The fixed set of widget types with a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetType {
    Weather,
    HeadlineList,
    Aggregator,
    PrStatus,
}

impl WidgetType {
    pub const ALL: [WidgetType; 4] = [
        WidgetType::Weather,
        WidgetType::HeadlineList,
        WidgetType::Aggregator,
        WidgetType::PrStatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WidgetType::Weather => "weather",
            WidgetType::HeadlineList => "headline-list",
            WidgetType::Aggregator => "aggregator",
            WidgetType::PrStatus => "pr-status",
        }
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetType {
    type Err = WidgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| WidgetError::UnknownType(s.to_string()))
    }
}

/// Widget row with its user-visible settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetView {
    #[serde(flatten)]
    pub widget: Widget,
    pub settings: Settings,
}

/// Type tag → orchestrator lookup
#[derive(Clone, Default)]
pub struct Registry {
    orchestrators: HashMap<WidgetType, Orchestrator>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the client for a type with its default refresh period
    pub fn register(
        &mut self,
        widget_type: WidgetType,
        client: Arc<dyn UpstreamClient>,
        default_refresh_secs: u64,
        store: SettingsStore,
        clock: Arc<dyn Clock>,
    ) -> &mut Self {
        self.orchestrators.insert(
            widget_type,
            Orchestrator::new(widget_type.as_str(), client, default_refresh_secs, store, clock),
        );
        self
    }

    pub fn contains(&self, widget_type: WidgetType) -> bool {
        self.orchestrators.contains_key(&widget_type)
    }

    /// Looks up the orchestrator for a stored type tag
    pub fn get(&self, type_tag: &str) -> Result<&Orchestrator, WidgetError> {
        let widget_type: WidgetType = type_tag.parse()?;
        self.orchestrators
            .get(&widget_type)
            .ok_or_else(|| WidgetError::UnknownType(type_tag.to_string()))
    }
}

/// Dispatcher used by the HTTP boundary
#[derive(Clone)]
pub struct WidgetService {
    store: SettingsStore,
    registry: Arc<Registry>,
}

impl WidgetService {
    pub fn new(store: SettingsStore, registry: Registry) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
        }
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Whether data can be served for widgets of this type
    pub fn supports(&self, widget_type: WidgetType) -> bool {
        self.registry.contains(widget_type)
    }

    fn require_widget(&self, id: i64) -> Result<Widget, WidgetError> {
        self.store
            .get_widget(id)?
            .ok_or(WidgetError::WidgetNotFound(id))
    }

    /// Returns data for a widget, cached or fresh
    ///
    /// # Returns
    /// * `Err(WidgetError::WidgetNotFound)` - no widget with this id
    /// * `Err(WidgetError::UnknownType)` - the widget's type has no client
    /// * `Err(WidgetError::Fetch)` - upstream failed and nothing was cached
    pub async fn get_widget_data(&self, id: i64, force: bool) -> Result<WidgetData, WidgetError> {
        let widget = self.require_widget(id)?;
        let settings = self.store.get_settings(id)?;
        let orchestrator = self.registry.get(&widget.widget_type)?;

        Ok(orchestrator.get_data(id, &settings, force).await?)
    }

    pub fn list_widgets(&self) -> Result<Vec<WidgetView>, WidgetError> {
        self.store
            .list_widgets()?
            .into_iter()
            .map(|widget| -> Result<WidgetView, WidgetError> {
                let settings = self.store.get_settings(widget.id)?.public();
                Ok(WidgetView { widget, settings })
            })
            .collect()
    }

    /// Creates a widget; reserved cache keys in the initial settings are rejected
    pub fn create_widget(
        &self,
        widget: NewWidget,
        settings: &Map<String, Value>,
    ) -> Result<WidgetView, WidgetError> {
        if widget.widget_type.trim().is_empty() {
            return Err(WidgetError::InvalidSettings("Widget type is required".to_string()));
        }

        let changes = parse_changes(settings)?;
        let initial: Settings = changes
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();

        let created = self.store.create_widget(&widget, &initial)?;
        info!(id = created.id, widget_type = %created.widget_type, "created widget");
        Ok(WidgetView {
            widget: created,
            settings: initial,
        })
    }

    pub fn update_layout(&self, id: i64, update: &LayoutUpdate) -> Result<WidgetView, WidgetError> {
        let widget = self
            .store
            .update_layout(id, update)?
            .ok_or(WidgetError::WidgetNotFound(id))?;
        let settings = self.store.get_settings(id)?.public();
        Ok(WidgetView { widget, settings })
    }

    pub fn delete_widget(&self, id: i64) -> Result<(), WidgetError> {
        if !self.store.delete_widget(id)? {
            return Err(WidgetError::WidgetNotFound(id));
        }
        info!(id, "deleted widget");
        Ok(())
    }

    pub fn get_settings(&self, id: i64) -> Result<Settings, WidgetError> {
        self.require_widget(id)?;
        Ok(self.store.get_settings(id)?.public())
    }

    /// Applies a settings update, invalidating the cache when fetch identity changes
    ///
    /// String values are stored as-is, other scalars are stringified, and
    /// `null` removes the setting. When a changed setting is one of the
    /// type's fetch keys, the cache entry and the type's derived settings are
    /// deleted in the same transaction that stores the new values.
    pub fn update_settings(
        &self,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<Settings, WidgetError> {
        let widget = self.require_widget(id)?;
        let current = self.store.get_settings(id)?;
        let changes = parse_changes(body)?;

        let mut remove: Vec<&str> = Vec::new();
        let mut upsert = Settings::new();
        for (key, value) in &changes {
            match value {
                Some(v) => upsert.insert(key.as_str(), v.as_str()),
                None => remove.push(key.as_str()),
            }
        }

        if let Ok(orchestrator) = self.registry.get(&widget.widget_type) {
            let client = orchestrator.client();
            let identity_changed = changes.iter().any(|(key, value)| {
                client.fetch_keys().contains(&key.as_str()) && current.get(key) != value.as_deref()
            });

            if identity_changed {
                debug!(id, widget_type = %widget.widget_type, "fetch settings changed, invalidating cache");
                remove.extend(CACHE_ENTRY_KEYS);
                remove.extend(client.derived_keys().iter().copied());
            }
        }

        self.store.apply(id, &remove, &upsert)?;
        Ok(self.store.get_settings(id)?.public())
    }
}

/// Converts a JSON settings body into string values
///
/// `None` marks a setting to delete. Writing cache bookkeeping keys is an
/// error, as is a nested object or array value.
fn parse_changes(body: &Map<String, Value>) -> Result<Vec<(String, Option<String>)>, WidgetError> {
    body.iter()
        .map(|(key, value)| {
            if CACHE_ENTRY_KEYS.contains(&key.as_str()) {
                return Err(WidgetError::InvalidSettings(format!(
                    "Setting '{}' is managed by the server",
                    key
                )));
            }
            let value = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(WidgetError::InvalidSettings(format!(
                        "Setting '{}' must be a string, number or boolean",
                        key
                    )))
                }
            };
            Ok((key.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::data::Fetched;
    use crate::error::FetchError;
    use crate::store::{CACHED_DATA, CACHE_KEY, LAST_FETCHED};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Upstream with weather-like keys that echoes a counter
    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UpstreamClient for CountingClient {
        async fn fetch(&self, _settings: &Settings) -> Result<Fetched, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Fetched::new(json!({ "n": n }))
                .with_derived("latitude", "48.85")
                .with_derived("longitude", "2.35"))
        }

        fn fetch_keys(&self) -> &'static [&'static str] {
            &["location", "units"]
        }

        fn derived_keys(&self) -> &'static [&'static str] {
            &["latitude", "longitude"]
        }
    }

    fn service() -> (WidgetService, Arc<CountingClient>) {
        let store = SettingsStore::open_in_memory().unwrap();
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
        });
        let mut registry = Registry::new();
        registry.register(
            WidgetType::Weather,
            client.clone(),
            1800,
            store.clone(),
            Arc::new(ManualClock::new(1_000)),
        );
        (WidgetService::new(store, registry), client)
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn create(service: &WidgetService, widget_type: &str, settings: Value) -> i64 {
        service
            .create_widget(NewWidget::of_type(widget_type), &body(settings))
            .unwrap()
            .widget
            .id
    }

    #[test]
    fn test_widget_type_parsing() {
        assert_eq!("weather".parse::<WidgetType>().unwrap(), WidgetType::Weather);
        assert_eq!(
            "headline-list".parse::<WidgetType>().unwrap(),
            WidgetType::HeadlineList
        );
        assert_eq!("pr-status".parse::<WidgetType>().unwrap(), WidgetType::PrStatus);
        assert!(matches!(
            "clock".parse::<WidgetType>(),
            Err(WidgetError::UnknownType(t)) if t == "clock"
        ));
    }

    #[test]
    fn test_widget_type_serde_matches_tags() {
        for t in WidgetType::ALL {
            assert_eq!(serde_json::to_value(t).unwrap(), json!(t.as_str()));
        }
    }

    #[test]
    fn test_supports_only_registered_types() {
        let (service, _) = service();
        assert!(service.supports(WidgetType::Weather));
        assert!(!service.supports(WidgetType::PrStatus));
    }

    #[tokio::test]
    async fn test_get_widget_data_missing_widget() {
        let (service, _) = service();
        let result = service.get_widget_data(99, false).await;
        assert!(matches!(result, Err(WidgetError::WidgetNotFound(99))));
    }

    #[tokio::test]
    async fn test_get_widget_data_unknown_type() {
        let (service, _) = service();
        let id = create(&service, "clock", json!({}));

        let result = service.get_widget_data(id, false).await;

        assert!(matches!(result, Err(WidgetError::UnknownType(_))));
    }

    #[tokio::test]
    async fn test_get_widget_data_known_but_unregistered_type() {
        let (service, _) = service();
        let id = create(&service, "aggregator", json!({}));

        let result = service.get_widget_data(id, false).await;

        assert!(matches!(result, Err(WidgetError::UnknownType(t)) if t == "aggregator"));
    }

    #[tokio::test]
    async fn test_get_widget_data_dispatches_and_caches() {
        let (service, client) = service();
        let id = create(&service, "weather", json!({ "location": "Paris" }));

        let first = service.get_widget_data(id, false).await.unwrap();
        let second = service.get_widget_data(id, false).await.unwrap();
        let forced = service.get_widget_data(id, true).await.unwrap();

        assert_eq!(first.data, json!({ "n": 1 }));
        assert_eq!(second.data, json!({ "n": 1 }));
        assert_eq!(forced.data, json!({ "n": 2 }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_location_change_invalidates_cache_and_coordinates() {
        let (service, client) = service();
        let id = create(&service, "weather", json!({ "location": "Paris" }));
        service.get_widget_data(id, false).await.unwrap();

        let stored = service.store().get_settings(id).unwrap();
        assert!(stored.contains("latitude"));
        assert!(stored.contains(CACHED_DATA));

        service
            .update_settings(id, &body(json!({ "location": "Berlin" })))
            .unwrap();

        let stored = service.store().get_settings(id).unwrap();
        assert_eq!(stored.get("location"), Some("Berlin"));
        for key in ["latitude", "longitude", CACHED_DATA, LAST_FETCHED, CACHE_KEY] {
            assert!(!stored.contains(key), "{} should be deleted", key);
        }

        service.get_widget_data(id, false).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unchanged_or_irrelevant_settings_keep_cache() {
        let (service, client) = service();
        let id = create(&service, "weather", json!({ "location": "Paris" }));
        service.get_widget_data(id, false).await.unwrap();

        service
            .update_settings(id, &body(json!({ "location": "Paris", "title": "Home" })))
            .unwrap();

        let stored = service.store().get_settings(id).unwrap();
        assert!(stored.contains(CACHED_DATA));
        assert!(stored.contains("latitude"));

        service.get_widget_data(id, false).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_update_settings_stringifies_and_deletes() {
        let (service, _) = service();
        let id = create(&service, "weather", json!({ "units": "celsius", "note": "x" }));

        let settings = service
            .update_settings(id, &body(json!({ "refresh_period": 300, "compact": true, "note": null })))
            .unwrap();

        assert_eq!(settings.get("refresh_period"), Some("300"));
        assert_eq!(settings.get("compact"), Some("true"));
        assert!(!settings.contains("note"));
    }

    #[test]
    fn test_update_settings_rejects_reserved_keys() {
        let (service, _) = service();
        let id = create(&service, "weather", json!({}));

        let result = service.update_settings(id, &body(json!({ "cached_data": "{}" })));

        assert!(matches!(result, Err(WidgetError::InvalidSettings(_))));
    }

    #[test]
    fn test_update_settings_missing_widget() {
        let (service, _) = service();
        let result = service.update_settings(7, &body(json!({ "location": "Oslo" })));
        assert!(matches!(result, Err(WidgetError::WidgetNotFound(7))));
    }

    #[tokio::test]
    async fn test_public_settings_hide_cache_entry() {
        let (service, _) = service();
        let id = create(&service, "weather", json!({ "location": "Paris" }));
        service.get_widget_data(id, false).await.unwrap();

        let settings = service.get_settings(id).unwrap();
        assert!(!settings.contains(CACHED_DATA));
        assert_eq!(settings.get("latitude"), Some("48.85"));

        let listed = service.list_widgets().unwrap();
        assert!(!listed[0].settings.contains(CACHE_KEY));
    }

    #[test]
    fn test_create_widget_requires_type() {
        let (service, _) = service();
        let result = service.create_widget(NewWidget::of_type(" "), &Map::new());
        assert!(matches!(result, Err(WidgetError::InvalidSettings(_))));
    }

    #[test]
    fn test_delete_widget() {
        let (service, _) = service();
        let id = create(&service, "weather", json!({}));

        service.delete_widget(id).unwrap();

        assert!(matches!(service.delete_widget(id), Err(WidgetError::WidgetNotFound(_))));
        assert!(matches!(service.get_settings(id), Err(WidgetError::WidgetNotFound(_))));
    }
}
