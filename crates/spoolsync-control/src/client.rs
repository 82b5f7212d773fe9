// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client side of the control socket: write one command, read one reply.

use std::path::Path;

use tokio::net::UnixStream;

use spoolsync_core::error::{Error, Result};
use spoolsync_core::types::Packet;

use crate::wire::{read_packet, write_packet};

/// Send `packet` to the daemon at the default host socket path and
/// return its reply.
pub async fn send(packet: &Packet) -> Result<Packet> {
    send_to(&crate::socket_path()?, packet).await
}

/// Send `packet` to the daemon listening at `path` and return its reply.
pub async fn send_to(path: &Path, packet: &Packet) -> Result<Packet> {
    let mut stream = UnixStream::connect(path)
        .await
        .map_err(|e| Error::Control(format!("connect {}: {e}", path.display())))?;
    write_packet(&mut stream, packet).await?;
    read_packet(&mut stream).await
}
