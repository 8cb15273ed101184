//! In-process cache for aggregator reference lists
//!
//! Topics and sources change rarely and are shared by every aggregator
//! widget, so each list lives in one cell with a long TTL. A failed refill
//! keeps serving the last good list (possibly empty) instead of erroring.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::Clock;
use crate::error::FetchError;

/// Default TTL for reference lists (24 hours)
pub const DEFAULT_REFERENCE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One selectable topic or source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub id: String,
    pub name: String,
}

/// Which reference list to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Topics,
    Sources,
}

impl ReferenceKind {
    /// Listing endpoint path segment
    pub fn path(self) -> &'static str {
        match self {
            ReferenceKind::Topics => "topics",
            ReferenceKind::Sources => "sources",
        }
    }
}

/// Upstream listing for reference data
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn list(&self, kind: ReferenceKind) -> Result<Vec<ReferenceEntry>, FetchError>;
}

#[derive(Debug, Default)]
struct Cell {
    entries: Vec<ReferenceEntry>,
    /// Unix seconds of the last successful refill
    fetched_at: Option<i64>,
}

/// Cached reference list with its own TTL and refill policy
pub struct ReferenceCache {
    kind: ReferenceKind,
    source: Arc<dyn ReferenceSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cell: Mutex<Cell>,
}

impl ReferenceCache {
    pub fn new(
        kind: ReferenceKind,
        source: Arc<dyn ReferenceSource>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            kind,
            source,
            clock,
            ttl,
            cell: Mutex::new(Cell::default()),
        }
    }

    /// Returns the list, refilling it from the source when expired
    ///
    /// Concurrent callers wait on the same refill rather than each hitting
    /// the source.
    pub async fn get(&self) -> Vec<ReferenceEntry> {
        let mut cell = self.cell.lock().await;
        let now = self.clock.now();

        if let Some(fetched_at) = cell.fetched_at {
            if now - fetched_at < self.ttl.as_secs() as i64 {
                return cell.entries.clone();
            }
        }

        match self.source.list(self.kind).await {
            Ok(entries) => {
                debug!(kind = self.kind.path(), count = entries.len(), "refilled reference cache");
                cell.entries = entries;
                cell.fetched_at = Some(now);
            }
            Err(e) => {
                warn!(kind = self.kind.path(), error = %e, "reference refill failed, keeping last list");
            }
        }
        cell.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeSource {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl ReferenceSource for FakeSource {
        async fn list(&self, kind: ReferenceKind) -> Result<Vec<ReferenceEntry>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::UpstreamUnavailable("down".into()));
            }
            Ok(vec![ReferenceEntry {
                id: format!("{}-{}", kind.path(), n),
                name: format!("Entry {}", n),
            }])
        }
    }

    fn cache_with(source: Arc<FakeSource>, clock: Arc<ManualClock>) -> ReferenceCache {
        ReferenceCache::new(ReferenceKind::Topics, source, clock, DEFAULT_REFERENCE_TTL)
    }

    #[tokio::test]
    async fn test_get_fills_once_within_ttl() {
        let source = FakeSource::new();
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(source.clone(), clock.clone());

        let first = cache.get().await;
        clock.advance(60 * 60);
        let second = cache.get().await;

        assert_eq!(first, second);
        assert_eq!(first[0].id, "topics-1");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_refills_after_ttl() {
        let source = FakeSource::new();
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(source.clone(), clock.clone());

        cache.get().await;
        clock.advance(24 * 60 * 60);
        let refreshed = cache.get().await;

        assert_eq!(refreshed[0].id, "topics-2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refill_returns_last_good_list() {
        let source = FakeSource::new();
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(source.clone(), clock.clone());

        cache.get().await;
        source.failing.store(true, Ordering::SeqCst);
        clock.advance(25 * 60 * 60);
        let entries = cache.get().await;

        assert_eq!(entries[0].id, "topics-1");
    }

    #[tokio::test]
    async fn test_failed_first_fill_returns_empty_and_retries() {
        let source = FakeSource::new();
        source.failing.store(true, Ordering::SeqCst);
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(source.clone(), clock);

        assert!(cache.get().await.is_empty());
        source.failing.store(false, Ordering::SeqCst);
        assert_eq!(cache.get().await.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
