//! Error taxonomy for the widget data layer
//!
//! `FetchError` is what upstream clients report, `StoreError` covers the
//! SQLite settings store, and `WidgetError` is what the dispatcher hands to
//! the HTTP boundary.

use thiserror::Error;

/// Errors that can occur when fetching data from an upstream provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The provider has nothing for the requested input (e.g. unknown location)
    #[error("{0}")]
    NotFound(String),

    /// The provider was reached but answered with a failure
    #[error("{0}")]
    UpstreamError(String),

    /// The provider could not be reached at all
    #[error("{0}")]
    UpstreamUnavailable(String),
}

impl FetchError {
    /// HTTP-style severity of this error
    pub fn status_code(&self) -> u16 {
        match self {
            FetchError::NotFound(_) => 404,
            FetchError::UpstreamError(_) => 502,
            FetchError::UpstreamUnavailable(_) => 503,
        }
    }

    /// Classifies a reqwest failure for the named service.
    ///
    /// Transport problems (connect, timeout) mean the service is unavailable;
    /// anything that got a response back (status, body decoding) is an
    /// upstream error.
    pub fn from_reqwest(service: &str, err: &reqwest::Error) -> Self {
        if err.is_status() || err.is_decode() || err.is_body() {
            FetchError::UpstreamError(format!("Failed to fetch {} data", service))
        } else {
            FetchError::UpstreamUnavailable(format!("{} service unavailable", service))
        }
    }
}

/// Errors raised by the SQLite settings store
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite statement failed
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error while preparing the database location
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection mutex was poisoned by a panicking holder
    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// Errors surfaced by the widget dispatcher
#[derive(Debug, Error)]
pub enum WidgetError {
    /// No widget row with this id
    #[error("Widget not found")]
    WidgetNotFound(i64),

    /// The widget's declared type has no registered client
    #[error("Unknown widget type: {0}")]
    UnknownType(String),

    /// The request carried settings that cannot be applied
    #[error("{0}")]
    InvalidSettings(String),

    /// Upstream fetch failed and no cached data was usable
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Settings store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
