// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolsync engine — the reconciliation core. Computes the diff between
// the directory service's desired printer set and the spooler's actual
// set, applies mutations, elects the default printer, and ages entries
// out through a persistent expiring cache. The collaborators it talks
// to (directory, spooler, session enumerator) are trait seams so the
// whole algorithm is testable without a network or a running spooler.

pub mod cache;
pub mod reconcile;
pub mod retry;
pub mod traits;

pub use cache::CacheStore;
pub use reconcile::{Engine, EngineSettings, SyncReport};
pub use retry::RetryStrategy;
pub use traits::{Directory, Sessions, Spooler};
