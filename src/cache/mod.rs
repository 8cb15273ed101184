//! Cache module for widget data and reference lists
//!
//! This module provides the read-through refresh orchestrator that persists
//! widget payloads into the settings store with a per-widget TTL. It supports
//! graceful degradation by returning the last good payload (marked stale)
//! when an upstream is unavailable. It also holds the in-process cache for
//! aggregator reference data.

mod clock;
mod key;
mod orchestrator;
mod reference;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::derive_cache_key;
pub use orchestrator::{Freshness, Orchestrator, WidgetData};
pub use reference::{ReferenceCache, ReferenceEntry, ReferenceKind, ReferenceSource};
