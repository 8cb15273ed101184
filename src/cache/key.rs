//! Cache key derivation
//!
//! A widget's cached payload is only valid for the settings it was fetched
//! with. The key is a SHA-256 over the widget type and the values of the
//! client's fetch-relevant settings, so any change to those settings yields a
//! different key and the old payload stops matching.

use sha2::{Digest, Sha256};

use crate::store::Settings;

/// Derives the cache key for a widget type and its current settings
///
/// `fetch_keys` order does not matter. A missing setting and an empty one
/// hash differently.
pub fn derive_cache_key(widget_type: &str, settings: &Settings, fetch_keys: &[&str]) -> String {
    let mut keys = fetch_keys.to_vec();
    keys.sort_unstable();
    keys.dedup();

    let mut hasher = Sha256::new();
    hasher.update(widget_type.as_bytes());
    hasher.update([0u8]);
    for key in keys {
        hasher.update(key.as_bytes());
        match settings.get(key) {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update(value.as_bytes());
            }
            None => hasher.update([2u8]),
        }
        hasher.update([0u8]);
    }

    format!("{:x}", hasher.finalize())
}
