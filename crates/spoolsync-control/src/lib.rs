// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unix-socket control protocol.
//
// One JSON packet per connection in each direction: the client writes a
// command packet, the daemon answers with exactly one `Response` packet
// and closes. The socket is world-writable so any local user can poke
// the daemon; every command is something a user could already do by
// waiting for the next timer tick.

use std::path::PathBuf;

use spoolsync_core::error::{Error, Result};

pub mod client;
pub mod listener;
pub mod wire;

pub use listener::{ControlRequest, Listener};

/// Socket file name, created under the first existing runtime directory.
pub const SOCKET_NAME: &str = "spoolsync.sock";

/// Candidate runtime directories, in probe order.
pub const RUN_DIRS: &[&str] = &["/var/run", "/run"];

/// The control socket path on this host: `SOCKET_NAME` under the first
/// of `RUN_DIRS` that exists.
pub fn socket_path() -> Result<PathBuf> {
    let dirs: Vec<PathBuf> = RUN_DIRS.iter().map(PathBuf::from).collect();
    socket_path_in(&dirs)
}

/// `SOCKET_NAME` under the first of `dirs` that exists.
pub fn socket_path_in(dirs: &[PathBuf]) -> Result<PathBuf> {
    for dir in dirs {
        if dir.is_dir() {
            return Ok(dir.join(SOCKET_NAME));
        }
    }
    Err(Error::Control(format!(
        "no runtime directory found (tried {})",
        dirs.iter().map(|d| d.display().to_string()).collect::<Vec<_>>().join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_existing_dir_wins() {
        let run = tempfile::tempdir().unwrap();
        let missing = run.path().join("var-run");
        let existing = run.path().join("run");
        std::fs::create_dir(&existing).unwrap();

        let path = socket_path_in(&[missing, existing.clone()]).unwrap();
        assert_eq!(path, existing.join(SOCKET_NAME));
    }

    #[test]
    fn earlier_dir_shadows_later_ones() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let path = socket_path_in(&[
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ])
        .unwrap();
        assert_eq!(path, first.path().join(SOCKET_NAME));
    }

    #[test]
    fn all_dirs_missing_is_an_error() {
        let run = tempfile::tempdir().unwrap();
        let err = socket_path_in(&[run.path().join("a"), run.path().join("b")]).unwrap_err();
        assert!(err.to_string().contains("no runtime directory"));
    }
}
