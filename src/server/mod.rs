//! HTTP boundary
//!
//! An axum router over the [`WidgetService`] and the aggregator reference
//! caches. Handlers stay thin: parse the request, call the service, map
//! `WidgetError` to a status code.

mod error;
mod extract;
mod routes;

pub use error::ApiError;
pub use extract::{ApiJson, ApiPath};

use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::cache::ReferenceCache;
use crate::registry::WidgetService;

/// Header reporting whether widget data came from the upstream or the cache
pub const CACHE_STATUS_HEADER: &str = "x-widget-cache";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: WidgetService,
    pub topics: Arc<ReferenceCache>,
    pub sources: Arc<ReferenceCache>,
}

/// Builds the `/api` router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route(
            "/api/widgets",
            get(routes::list_widgets).post(routes::create_widget),
        )
        .route(
            "/api/widgets/{id}",
            axum::routing::put(routes::update_layout).delete(routes::delete_widget),
        )
        .route(
            "/api/widgets/{id}/settings",
            get(routes::get_settings).put(routes::update_settings),
        )
        .route("/api/widgets/{id}/data", get(routes::widget_data))
        .route("/api/aggregator/topics", get(routes::topics))
        .route("/api/aggregator/sources", get(routes::sources))
        .with_state(state)
}
