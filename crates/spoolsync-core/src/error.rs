// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Spoolsync.

use thiserror::Error;

/// Top-level error type for all Spoolsync operations.
#[derive(Debug, Error)]
pub enum Error {
    // -- Collaborator errors --
    #[error("directory request failed: {0}")]
    Directory(String),

    /// Transport-level directory failure (connect, timeout). Retryable,
    /// unlike a definitive HTTP status error.
    #[error("directory service unreachable: {0}")]
    DirectoryUnavailable(String),

    #[error("spooler request failed: {0}")]
    Spooler(String),

    /// The spooler reports no destinations configured. Get-Printers
    /// callers treat this as an empty printer list.
    #[error("spooler has no destinations")]
    NoDestinations,

    #[error("session enumeration failed: {0}")]
    Sessions(String),

    // -- Driver resolution --
    #[error("printer {0} has no driver configuration")]
    DriverMissing(String),

    #[error("no matching driver in the spooler catalog for printer {0}")]
    DriverNotFound(String),

    // -- Persistence --
    #[error("cache error: {0}")]
    Cache(String),

    // -- Control channel --
    #[error("control channel error: {0}")]
    Control(String),

    // -- Configuration --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, Error>;
