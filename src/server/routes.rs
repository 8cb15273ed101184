use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::extract::{ApiJson, ApiPath};
use super::{ApiError, AppState, CACHE_STATUS_HEADER};
use crate::cache::ReferenceEntry;
use crate::error::WidgetError;
use crate::registry::WidgetView;
use crate::store::{LayoutUpdate, NewWidget, Settings};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_widgets(State(state): State<AppState>) -> Result<Json<Vec<WidgetView>>, ApiError> {
    Ok(Json(state.service.list_widgets()?))
}

#[derive(Debug, Deserialize)]
pub struct CreateWidget {
    #[serde(rename = "type")]
    widget_type: Option<String>,
    x: Option<i64>,
    y: Option<i64>,
    width: Option<i64>,
    height: Option<i64>,
    #[serde(default)]
    settings: Map<String, Value>,
}

pub async fn create_widget(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateWidget>,
) -> Result<(StatusCode, Json<WidgetView>), ApiError> {
    let widget_type = body
        .widget_type
        .ok_or_else(|| WidgetError::InvalidSettings("Widget type is required".to_string()))?;

    let defaults = NewWidget::of_type(widget_type);
    let widget = NewWidget {
        x: body.x.unwrap_or(defaults.x),
        y: body.y.unwrap_or(defaults.y),
        width: body.width.unwrap_or(defaults.width),
        height: body.height.unwrap_or(defaults.height),
        ..defaults
    };

    let created = state.service.create_widget(widget, &body.settings)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_layout(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<LayoutUpdate>,
) -> Result<Json<WidgetView>, ApiError> {
    Ok(Json(state.service.update_layout(id, &update)?))
}

pub async fn delete_widget(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Value>, ApiError> {
    state.service.delete_widget(id)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_settings(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.service.get_settings(id)?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(changes): ApiJson<Map<String, Value>>,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.service.update_settings(id, &changes)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct DataQuery {
    #[serde(default)]
    force: Option<String>,
}

impl DataQuery {
    /// `?force=true` or `?force=1`; anything else reads through the cache
    fn force(&self) -> bool {
        matches!(self.force.as_deref(), Some("true") | Some("1"))
    }
}

pub async fn widget_data(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(query): Query<DataQuery>,
) -> Result<Response, ApiError> {
    let result = state.service.get_widget_data(id, query.force()).await?;
    debug!(id, freshness = result.freshness.as_str(), "serving widget data");

    let mut response = Json(result.data).into_response();
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(result.freshness.as_str()),
    );
    Ok(response)
}

pub async fn topics(State(state): State<AppState>) -> Json<Vec<ReferenceEntry>> {
    Json(state.topics.get().await)
}

pub async fn sources(State(state): State<AppState>) -> Json<Vec<ReferenceEntry>> {
    Json(state.sources.get().await)
}
