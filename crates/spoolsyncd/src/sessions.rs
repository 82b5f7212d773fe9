// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Active-user enumeration from the utmp/utmpx databases.
//
// Records are read raw rather than through libc's utmpent API so a
// broken entry corrupts one record, not the whole walk. Only the record
// type and the user name field are decoded.

use std::collections::BTreeSet;

use tracing::warn;

use spoolsync_core::error::{Error, Result};
use spoolsync_engine::Sessions;

/// ut_type value marking a record as a live user login.
const USER_PROCESS: i16 = 7;

/// Fixed on-disk layout of one session record.
struct RecordFormat {
    record_len: usize,
    type_offset: usize,
    name_offset: usize,
    name_len: usize,
}

/// glibc utmp: 384-byte records, ut_type first, ut_user at offset 44.
const UTMP: RecordFormat =
    RecordFormat { record_len: 384, type_offset: 0, name_offset: 44, name_len: 32 };

/// BSD-style utmpx: 628-byte records, ut_user first, ut_type at 296.
const UTMPX: RecordFormat =
    RecordFormat { record_len: 628, type_offset: 296, name_offset: 0, name_len: 256 };

/// Database locations in probe order.
const SOURCES: &[(&str, &RecordFormat)] =
    &[("/var/run/utmp", &UTMP), ("/run/utmp", &UTMP), ("/var/run/utmpx", &UTMPX)];

/// `Sessions` implementation over the host's utmp database.
pub struct UtmpSessions;

impl Sessions for UtmpSessions {
    fn active_users(&self) -> Result<BTreeSet<String>> {
        for (path, format) in SOURCES {
            match std::fs::read(path) {
                Ok(bytes) => return Ok(parse_records(&bytes, format)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path, error = %e, "unable to read session database");
                    continue;
                }
            }
        }
        Err(Error::Sessions(format!(
            "no session database found (tried {})",
            SOURCES.iter().map(|(p, _)| *p).collect::<Vec<_>>().join(", ")
        )))
    }
}

fn parse_records(bytes: &[u8], format: &RecordFormat) -> BTreeSet<String> {
    let mut users = BTreeSet::new();
    for record in bytes.chunks_exact(format.record_len) {
        let kind = i16::from_le_bytes([
            record[format.type_offset],
            record[format.type_offset + 1],
        ]);
        if kind != USER_PROCESS {
            continue;
        }
        let raw = &record[format.name_offset..format.name_offset + format.name_len];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        if end == 0 {
            continue;
        }
        match std::str::from_utf8(&raw[..end]) {
            Ok(name) => {
                users.insert(name.to_string());
            }
            Err(_) => warn!("session record with non-utf8 user name, skipping"),
        }
    }
    users
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(format: &RecordFormat, kind: i16, name: &str) -> Vec<u8> {
        let mut bytes = vec![0u8; format.record_len];
        bytes[format.type_offset..format.type_offset + 2]
            .copy_from_slice(&kind.to_le_bytes());
        bytes[format.name_offset..format.name_offset + name.len()]
            .copy_from_slice(name.as_bytes());
        bytes
    }

    #[test]
    fn extracts_user_process_records() {
        let mut bytes = record(&UTMP, USER_PROCESS, "alice");
        bytes.extend(record(&UTMP, USER_PROCESS, "bob"));
        let users = parse_records(&bytes, &UTMP);
        assert_eq!(users, BTreeSet::from(["alice".to_string(), "bob".to_string()]));
    }

    #[test]
    fn ignores_non_login_records() {
        // 2 = BOOT_TIME, 8 = DEAD_PROCESS.
        let mut bytes = record(&UTMP, 2, "reboot");
        bytes.extend(record(&UTMP, 8, "gone"));
        bytes.extend(record(&UTMP, USER_PROCESS, "alice"));
        let users = parse_records(&bytes, &UTMP);
        assert_eq!(users, BTreeSet::from(["alice".to_string()]));
    }

    #[test]
    fn duplicate_logins_deduplicate() {
        let mut bytes = record(&UTMP, USER_PROCESS, "alice");
        bytes.extend(record(&UTMP, USER_PROCESS, "alice"));
        assert_eq!(parse_records(&bytes, &UTMP).len(), 1);
    }

    #[test]
    fn empty_names_and_trailing_garbage_are_skipped() {
        let mut bytes = record(&UTMP, USER_PROCESS, "");
        bytes.extend(record(&UTMP, USER_PROCESS, "alice"));
        // A truncated record at the tail must not panic.
        bytes.extend(vec![0u8; 100]);
        let users = parse_records(&bytes, &UTMP);
        assert_eq!(users, BTreeSet::from(["alice".to_string()]));
    }

    #[test]
    fn utmpx_layout_parses() {
        let bytes = record(&UTMPX, USER_PROCESS, "carol");
        let users = parse_records(&bytes, &UTMPX);
        assert_eq!(users, BTreeSet::from(["carol".to_string()]));
    }
}
