// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator trait seams for the reconciliation engine.
//
// The engine only ever sees these traits; the production implementations
// live in `spoolsync-directory`, `spoolsync-cups`, and the daemon's
// session enumerator, and the tests substitute in-memory mocks.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use spoolsync_core::error::Result;
use spoolsync_core::types::{Printer, ResolvedDriver, SpoolerPrinter};

/// The directory service publishing desired printers per username.
pub trait Directory {
    /// Fetch the desired printers for the given usernames. A user
    /// unknown to the directory contributes no printers rather than an
    /// error; duplicate printer ids across users keep one record.
    fn get_printers(
        &self,
        usernames: &[String],
    ) -> impl Future<Output = Result<Vec<Printer>>> + Send;
}

/// The local print spooler owning the actual printer registrations.
pub trait Spooler {
    /// List the printers currently registered with the spooler.
    /// An unconfigured spooler yields `Error::NoDestinations`.
    fn get_printers(&self) -> impl Future<Output = Result<Vec<SpoolerPrinter>>> + Send;

    /// Create or update a printer registration with the given resolved
    /// driver, then apply its spooler options.
    fn add_or_modify(
        &self,
        printer: &Printer,
        driver: &ResolvedDriver,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete the printer with the given (sanitized) id.
    fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// The id of the current default printer, if one is set.
    fn get_default(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Make the printer with the given id the default.
    fn set_default(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// The driver catalog: `ppd-make-and-model` → spooler driver name.
    /// Implementations may serve this from a short-TTL cache.
    fn driver_catalog(&self) -> impl Future<Output = Result<BTreeMap<String, String>>> + Send;

    /// Drop any cached driver catalog so the next lookup hits the
    /// spooler again.
    fn invalidate_driver_catalog(&self);
}

/// Enumerates the users with an active session on this host.
pub trait Sessions {
    /// The deduplicated set of currently logged-in usernames.
    fn active_users(&self) -> Result<BTreeSet<String>>;
}
