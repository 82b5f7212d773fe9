// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Daemon configuration, read from SPOOLSYNC_* environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default on-disk location of the expiring printer cache.
pub const DEFAULT_CACHE_PATH: &str = "/var/lib/spoolsync/cache.db";

/// Default address of the local CUPS server.
pub const DEFAULT_CUPS_URL: &str = "http://localhost:631";

/// Runtime configuration for the daemon.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the directory service (required).
    pub api_base: String,
    /// SQLite file backing the expiring printer cache.
    pub cache_path: PathBuf,
    /// How long a desired printer stays cached after it was last
    /// confirmed by the directory service.
    pub cache_retention: Duration,
    /// Interval between periodic reconciliations.
    pub sync_interval: Duration,
    /// Usernames excluded from the active-user set.
    pub ignored_users: Vec<String>,
    /// Address of the local CUPS server.
    pub cups_url: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base = get("SPOOLSYNC_API_BASE")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("SPOOLSYNC_API_BASE is required".into()))?;

        let cache_path = get("SPOOLSYNC_CACHE_PATH")
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH), PathBuf::from);

        let cache_retention = match get("SPOOLSYNC_CACHE_RETENTION") {
            Some(v) => parse_duration(&v)
                .map_err(|e| Error::Config(format!("SPOOLSYNC_CACHE_RETENTION: {e}")))?,
            None => Duration::from_secs(14 * 24 * 60 * 60),
        };

        let sync_interval = match get("SPOOLSYNC_SYNC_INTERVAL") {
            Some(v) => parse_duration(&v)
                .map_err(|e| Error::Config(format!("SPOOLSYNC_SYNC_INTERVAL: {e}")))?,
            None => Duration::from_secs(60 * 60),
        };

        let ignored_users = match get("SPOOLSYNC_IGNORE_USERS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect(),
            None => vec!["root".to_string()],
        };

        let cups_url = get("SPOOLSYNC_CUPS_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CUPS_URL.to_string());

        Ok(Self { api_base, cache_path, cache_retention, sync_interval, ignored_users, cups_url })
    }
}

/// Parse a duration string of the form `14d`, `1h30m`, `45s`, `250ms`,
/// or a bare number of seconds. Units may be chained largest-first.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".into());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(format!("unexpected '{c}' in duration '{input}'"));
        }
        let value: u64 = digits.parse().map_err(|e| format!("bad number in '{input}': {e}"))?;
        digits.clear();

        let unit = match c {
            'd' => Duration::from_secs(24 * 60 * 60),
            'h' => Duration::from_secs(60 * 60),
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                Duration::from_millis(1)
            }
            'm' => Duration::from_secs(60),
            's' => Duration::from_secs(1),
            _ => return Err(format!("unknown unit '{c}' in duration '{input}'")),
        };
        total += unit * u32::try_from(value).map_err(|_| format!("value too large in '{input}'"))?;
    }
    if !digits.is_empty() {
        return Err(format!("missing unit after '{digits}' in duration '{input}'"));
    }
    Ok(total)
}
