// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Short-TTL cache for the CUPS driver catalog.
//
// CUPS-Get-PPDs walks the whole PPD repository server-side and is by far
// the slowest call a sync makes, while its result only changes when
// driver packages are installed or removed. One catalog fetch therefore
// serves a whole burst of syncs.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Default catalog lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// `ppd-make-and-model` → `ppd-name`, cached with a fetch timestamp.
pub struct DriverCatalogCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, BTreeMap<String, String>)>>,
}

impl DriverCatalogCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: Mutex::new(None) }
    }

    /// The cached catalog, or `None` when empty or older than the TTL.
    /// A poisoned lock counts as a miss.
    pub fn get(&self) -> Option<BTreeMap<String, String>> {
        let guard = self.entry.lock().ok()?;
        match guard.as_ref() {
            Some((fetched, catalog)) if fetched.elapsed() < self.ttl => {
                debug!(entries = catalog.len(), "driver catalog served from cache");
                Some(catalog.clone())
            }
            _ => None,
        }
    }

    /// Replace the cached catalog and restart its TTL.
    pub fn store(&self, catalog: BTreeMap<String, String>) {
        if let Ok(mut guard) = self.entry.lock() {
            *guard = Some((Instant::now(), catalog));
        }
    }

    /// Drop the cached catalog so the next `get` misses.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.entry.lock() {
            *guard = None;
        }
    }
}

impl Default for DriverCatalogCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<String, String> {
        let mut catalog = BTreeMap::new();
        catalog.insert("Generic PCL".to_string(), "drv:///sample.drv/generpcl.ppd".to_string());
        catalog
    }

    #[test]
    fn empty_cache_misses() {
        assert!(DriverCatalogCache::default().get().is_none());
    }

    #[test]
    fn stored_catalog_is_served_within_ttl() {
        let cache = DriverCatalogCache::default();
        cache.store(sample());
        assert_eq!(cache.get().unwrap(), sample());
    }

    #[test]
    fn expired_catalog_misses() {
        let cache = DriverCatalogCache::new(Duration::ZERO);
        cache.store(sample());
        assert!(cache.get().is_none());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = DriverCatalogCache::default();
        cache.store(sample());
        cache.clear();
        assert!(cache.get().is_none());
    }
}
