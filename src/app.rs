//! Application wiring
//!
//! Builds every long-lived component from a [`Config`]: the settings store,
//! one client per widget type, the registry, and the aggregator reference
//! caches. `main` only has to parse flags and call [`serve`].

use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::cache::{Clock, ReferenceCache, ReferenceKind, SystemClock};
use crate::config::Config;
use crate::data::{
    http_client, AggregatorClient, CommandRunner, HeadlineClient, PrStatusClient, ProcessRunner,
    WeatherClient,
};
use crate::error::StoreError;
use crate::registry::{Registry, WidgetService, WidgetType};
use crate::server::{self, AppState};
use crate::store::SettingsStore;

/// Startup failures
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to open settings store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the registry and HTTP state over an opened store
///
/// # Arguments
/// * `config` - Timeouts, refresh defaults and upstream endpoints
/// * `store` - Settings store shared by the orchestrators and the service
/// * `clock` - Time source for cache ages
/// * `runner` - Process runner for the pull-request client
pub fn build_state(
    config: &Config,
    store: SettingsStore,
    clock: Arc<dyn Clock>,
    runner: Arc<dyn CommandRunner>,
) -> Result<AppState, AppError> {
    let http = http_client(config.http_timeout())?;
    let upstream = &config.upstream;
    let aggregator = Arc::new(AggregatorClient::with_base_url(
        http.clone(),
        upstream.aggregator.clone(),
    ));

    let mut registry = Registry::new();
    registry
        .register(
            WidgetType::Weather,
            Arc::new(WeatherClient::with_base_urls(
                http.clone(),
                upstream.forecast.clone(),
                upstream.geocoding.clone(),
            )),
            config.refresh.weather,
            store.clone(),
            clock.clone(),
        )
        .register(
            WidgetType::HeadlineList,
            Arc::new(HeadlineClient::with_base_url(http, upstream.headlines.clone())),
            config.refresh.headline_list,
            store.clone(),
            clock.clone(),
        )
        .register(
            WidgetType::Aggregator,
            aggregator.clone(),
            config.refresh.aggregator,
            store.clone(),
            clock.clone(),
        )
        .register(
            WidgetType::PrStatus,
            Arc::new(PrStatusClient::with_program(runner, upstream.gh_program.clone())),
            config.refresh.pr_status,
            store.clone(),
            clock.clone(),
        );

    let ttl = config.reference_ttl();
    Ok(AppState {
        service: WidgetService::new(store, registry),
        topics: Arc::new(ReferenceCache::new(
            ReferenceKind::Topics,
            aggregator.clone(),
            clock.clone(),
            ttl,
        )),
        sources: Arc::new(ReferenceCache::new(ReferenceKind::Sources, aggregator, clock, ttl)),
    })
}

/// Opens the database, builds the router and serves until the process ends
pub async fn serve(config: Config) -> Result<(), AppError> {
    let store = SettingsStore::open(&config.db_path)?;
    info!(path = %config.db_path.display(), "opened settings store");

    let runner = Arc::new(ProcessRunner::new(config.command_timeout()));
    let state = build_state(&config, store, Arc::new(SystemClock), runner)?;

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %listener.local_addr()?, "deskboard listening");
    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
