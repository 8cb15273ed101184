//! Typed errors → HTTP responses

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::error::WidgetError;

/// Error returned by route handlers, rendered as `{"error": message}`
#[derive(Debug)]
pub enum ApiError {
    /// Failure reported by the widget service
    Widget(WidgetError),
    /// Request body or path that could not be extracted
    BadRequest(String),
}

impl From<WidgetError> for ApiError {
    fn from(err: WidgetError) -> Self {
        ApiError::Widget(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "rejected request body");
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!(error = %rejection, "rejected request path");
        ApiError::BadRequest(format!("Invalid request path: {}", rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Widget(err) => match err {
                WidgetError::WidgetNotFound(_) => StatusCode::NOT_FOUND,
                WidgetError::UnknownType(_) | WidgetError::InvalidSettings(_) => {
                    StatusCode::BAD_REQUEST
                }
                WidgetError::Fetch(e) => {
                    StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                WidgetError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Widget(WidgetError::Store(e)) => {
                error!(error = %e, "settings store failure");
                "Internal server error".to_string()
            }
            ApiError::Widget(other) => other.to_string(),
            ApiError::BadRequest(message) => message,
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, StoreError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WidgetError::WidgetNotFound(1), StatusCode::NOT_FOUND),
            (WidgetError::UnknownType("x".into()), StatusCode::BAD_REQUEST),
            (WidgetError::InvalidSettings("x".into()), StatusCode::BAD_REQUEST),
            (
                WidgetError::Fetch(FetchError::NotFound("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                WidgetError::Fetch(FetchError::UpstreamError("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                WidgetError::Fetch(FetchError::UpstreamUnavailable("x".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                WidgetError::Store(StoreError::LockPoisoned),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_bad_request_status() {
        let err = ApiError::BadRequest("Invalid request body: EOF".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_error_message_is_generic() {
        let response = ApiError::from(WidgetError::Store(StoreError::LockPoisoned)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
