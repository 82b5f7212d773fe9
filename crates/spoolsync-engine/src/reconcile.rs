// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The reconciliation algorithm.
//
// One `sync` run: resolve active users → fetch and coalesce desired
// printers → refresh the expiring cache → create/update registrations →
// prune superseded and expired printers → elect the default → purge
// aged-out cache entries. Per-printer failures are recorded and skipped;
// directory and cache failures abort the run, and the next timer tick
// is the retry mechanism.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use spoolsync_core::error::{Error, Result};
use spoolsync_core::types::{Printer, ResolvedDriver, sanitize_id};

use crate::cache::CacheStore;
use crate::traits::{Directory, Sessions, Spooler};

/// Engine tuning knobs, taken from the daemon configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// How long a desired printer stays cached after it was last seen.
    pub retention: Duration,
    /// Usernames excluded from the active-user set.
    pub ignored_users: Vec<String>,
}

/// What a reconciliation run did, for logging and tests.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    /// The users whose printers were requested.
    pub users: Vec<String>,
    /// Number of desired printers after coalescing.
    pub desired: usize,
    /// Ids that failed driver resolution or spooler registration.
    pub errored: Vec<String>,
    /// Unmanaged spooler printers deleted as superseded.
    pub removed_unmanaged: Vec<String>,
    /// Expired printers deleted from the spooler.
    pub removed_expired: Vec<String>,
    /// Cache ids purged at the end of the run.
    pub purged: Vec<String>,
    /// The elected default printer, if any.
    pub default_printer: Option<String>,
}

/// The reconciliation engine. Generic over its collaborators so the
/// algorithm can be exercised against in-memory fakes.
pub struct Engine<D, S, U> {
    directory: D,
    spooler: S,
    sessions: U,
    cache: CacheStore,
    settings: EngineSettings,
}

impl<D: Directory, S: Spooler, U: Sessions> Engine<D, S, U> {
    pub fn new(
        directory: D,
        spooler: S,
        sessions: U,
        cache: CacheStore,
        settings: EngineSettings,
    ) -> Self {
        Self { directory, spooler, sessions, cache, settings }
    }

    /// Reconcile the spooler against the directory service for the
    /// currently active users plus `explicit_users`.
    pub async fn sync(&self, explicit_users: &[String]) -> Result<SyncReport> {
        info!("starting sync");
        let mut report = SyncReport::default();

        // 1. Active users, minus the ignore list, plus explicit ones.
        let mut users = self.sessions.active_users()?;
        users.retain(|u| !self.settings.ignored_users.contains(u));
        users.extend(explicit_users.iter().cloned());
        let users: Vec<String> = users.into_iter().collect();
        info!(users = %users.join(", "), "fetching desired printers");

        // 2. Desired set: sanitized ids, coalesced (last write wins).
        let fetched = self.directory.get_printers(&users).await?;
        let mut desired: BTreeMap<String, Printer> = BTreeMap::new();
        for mut printer in fetched {
            let id = sanitize_id(&printer.id);
            if id.is_empty() {
                warn!(raw_id = %printer.id, "printer id sanitizes to nothing, skipping");
                continue;
            }
            printer.id = id.clone();
            desired.insert(id, printer);
        }
        report.users = users;
        report.desired = desired.len();
        info!(count = desired.len(), "got desired printers from directory");

        // 3. Refresh the cache for every desired id and persist before
        // touching the spooler; the cache must not drift from the
        // desired set.
        let now = Utc::now();
        let retention = chrono::Duration::from_std(self.settings.retention)
            .map_err(|e| Error::Config(format!("cache retention out of range: {e}")))?;
        let mut cache = self.cache.read()?;
        for id in desired.keys() {
            let refreshed = now + retention;
            let entry = cache.entry(id.clone()).or_insert(refreshed);
            if *entry < refreshed {
                *entry = refreshed;
            }
        }
        self.cache.write(&cache)?;

        // 4. Create or update each desired printer. Failures here are
        // per-printer: log, mark errored, carry on.
        let mut errored = BTreeSet::new();
        for printer in desired.values() {
            match self.install(printer).await {
                Ok(()) => {
                    info!(id = %printer.id, host = %printer.hostname, "added/modified printer");
                }
                Err(e) => {
                    warn!(id = %printer.id, host = %printer.hostname, error = %e,
                        "unable to add or modify printer");
                    errored.insert(printer.id.clone());
                }
            }
        }
        report.errored = errored.iter().cloned().collect();

        // 5. Actual state. An unconfigured spooler has no destinations,
        // which is an empty list rather than a failure.
        let actual = match self.spooler.get_printers().await {
            Ok(printers) => printers,
            Err(Error::NoDestinations) => Vec::new(),
            Err(e) => return Err(e),
        };
        info!(count = actual.len(), "got printers from spooler");

        // 6. Unmanaged pruning: an actual printer with a foreign id
        // whose device URI contains a desired printer's device host is
        // a superseded registration of the same physical device. The
        // substring match tolerates URI scheme and port drift.
        for registered in &actual {
            if desired.contains_key(&registered.id) {
                continue;
            }
            let superseded_by = desired.values().find(|p| {
                !errored.contains(&p.id)
                    && !p.hostname.is_empty()
                    && registered.device_uri.contains(&p.hostname)
            });
            if let Some(winner) = superseded_by {
                match self.spooler.delete(&registered.id).await {
                    Ok(()) => {
                        info!(id = %registered.id, uri = %registered.device_uri,
                            matched = %winner.id, "removed superseded printer");
                        report.removed_unmanaged.push(registered.id.clone());
                    }
                    Err(e) => {
                        warn!(id = %registered.id, error = %e,
                            "unable to remove superseded printer");
                    }
                }
            }
        }

        // 7. Expiration pruning. A failed deletion keeps the cache
        // entry so the next run retries it.
        let mut purge_queue = Vec::new();
        for (id, expires) in &cache {
            if *expires >= now {
                continue;
            }
            if actual.iter().any(|p| &p.id == id) {
                if let Err(e) = self.spooler.delete(id).await {
                    warn!(id = %id, error = %e, "unable to delete expired printer");
                    continue;
                }
                info!(id = %id, "deleted expired printer");
                report.removed_expired.push(id.clone());
            }
            purge_queue.push(id.clone());
        }

        // 8. Default election.
        let current_default = match self.spooler.get_default().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "unable to read spooler default");
                None
            }
        };
        let mut elected: Option<&Printer> = current_default
            .as_deref()
            .and_then(|id| desired.get(id))
            .filter(|p| !errored.contains(&p.id));
        for printer in desired.values() {
            if errored.contains(&printer.id) {
                continue;
            }
            // Strictly greater wins; ties keep the earlier candidate,
            // so equal-priority winners are the lexicographically
            // smallest id (desired is a BTreeMap).
            match elected {
                None => elected = Some(printer),
                Some(current) if printer.default_priority() > current.default_priority() => {
                    elected = Some(printer);
                }
                _ => {}
            }
        }
        if let Some(winner) = elected {
            report.default_printer = Some(winner.id.clone());
            if current_default.as_deref() != Some(winner.id.as_str()) {
                match self.spooler.set_default(&winner.id).await {
                    Ok(()) => info!(id = %winner.id, "set default printer"),
                    Err(e) => warn!(id = %winner.id, error = %e, "unable to set default printer"),
                }
            }
        }

        // 9. Purge aged-out entries. Best effort: on failure the
        // entries survive and the next run repeats the deletions.
        if !purge_queue.is_empty() {
            match self.cache.purge(&purge_queue) {
                Ok(()) => report.purged = purge_queue,
                Err(e) => warn!(error = %e, "unable to purge cache"),
            }
        }

        info!("sync completed");
        Ok(report)
    }

    /// Delete every tracked printer from the spooler (best effort) and
    /// discard the tracking cache unconditionally. Returns the number
    /// of cache entries discarded.
    pub async fn clear_cache(&self) -> Result<usize> {
        info!("clearing cached printers");
        let cache = self.cache.read()?;

        let actual = match self.spooler.get_printers().await {
            Ok(printers) => printers,
            Err(Error::NoDestinations) => Vec::new(),
            Err(e) => return Err(e),
        };

        for id in cache.keys() {
            if !actual.iter().any(|p| &p.id == id) {
                continue;
            }
            match self.spooler.delete(id).await {
                Ok(()) => info!(id = %id, "deleted cached printer"),
                Err(e) => warn!(id = %id, error = %e, "unable to delete cached printer"),
            }
        }

        // Unlike sync's expiration pruning, tracking state is dropped
        // regardless of deletion outcomes.
        let ids: Vec<String> = cache.keys().cloned().collect();
        if let Err(e) = self.cache.purge(&ids) {
            warn!(error = %e, "unable to purge cache");
        }
        self.spooler.invalidate_driver_catalog();

        info!(entries = ids.len(), "cache cleared");
        Ok(ids.len())
    }

    /// The spooler's driver catalog, for the list-drivers command.
    pub async fn list_drivers(&self) -> Result<BTreeMap<String, String>> {
        self.spooler.driver_catalog().await
    }

    async fn install(&self, printer: &Printer) -> Result<()> {
        let driver = self.resolve_driver(printer).await?;
        self.spooler.add_or_modify(printer, &driver).await
    }

    /// Ordered-candidate driver resolution: the first candidate present
    /// in the catalog wins; a total miss falls back to the driverless
    /// path only when the printer allows it.
    async fn resolve_driver(&self, printer: &Printer) -> Result<ResolvedDriver> {
        let Some(config) = &printer.driver else {
            return Err(Error::DriverMissing(printer.id.clone()));
        };
        let catalog = self.spooler.driver_catalog().await?;
        for candidate in &config.driver_names {
            if let Some(name) = catalog.get(candidate) {
                return Ok(ResolvedDriver::Catalog(name.clone()));
            }
        }
        if config.fallback_everywhere {
            return Ok(ResolvedDriver::Everywhere);
        }
        Err(Error::DriverNotFound(printer.id.clone()))
    }
}
