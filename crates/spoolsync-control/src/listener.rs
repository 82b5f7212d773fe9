// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Daemon side of the control socket.
//
// Each accepted connection becomes one `ControlRequest` on the command
// channel; the dispatcher answers through the request's oneshot and the
// connection task writes that answer back and closes.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use spoolsync_core::error::{Error, Result};
use spoolsync_core::types::Packet;

use crate::wire::{read_packet, write_packet};

/// One inbound command awaiting a dispatcher answer.
pub struct ControlRequest {
    pub packet: Packet,
    pub reply: oneshot::Sender<Packet>,
}

/// Bound control socket.
pub struct Listener {
    listener: UnixListener,
    path: PathBuf,
}

impl Listener {
    /// Bind at the default host socket path.
    pub fn bind() -> Result<Self> {
        Self::bind_at(crate::socket_path()?)
    }

    /// Bind at an explicit path, replacing a stale socket file left by a
    /// previous run. The socket is made world-writable: commands need no
    /// privilege beyond local access.
    pub fn bind_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            debug!(path = %path.display(), "removing stale control socket");
            std::fs::remove_file(&path)
                .map_err(|e| Error::Control(format!("remove stale {}: {e}", path.display())))?;
        }

        let listener = UnixListener::bind(&path)
            .map_err(|e| Error::Control(format!("bind {}: {e}", path.display())))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o777))
            .map_err(|e| Error::Control(format!("chmod {}: {e}", path.display())))?;

        info!(path = %path.display(), "control socket listening");
        Ok(Self { listener, path })
    }

    /// The bound socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections forever, forwarding each command to `commands`.
    pub async fn serve(self, commands: mpsc::Sender<ControlRequest>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(handle_connection(stream, commands.clone()));
                }
                Err(e) => warn!(error = %e, "control socket accept failed"),
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, commands: mpsc::Sender<ControlRequest>) {
    let packet = match read_packet(&mut stream).await {
        Ok(packet) => packet,
        Err(e) => {
            warn!(error = %e, "bad control packet");
            return;
        }
    };
    debug!(kind = ?packet.kind, "control command received");

    let (reply_tx, reply_rx) = oneshot::channel();
    if commands.send(ControlRequest { packet, reply: reply_tx }).await.is_err() {
        let _ = write_packet(&mut stream, &Packet::response("daemon is shutting down")).await;
        return;
    }
    let reply = match reply_rx.await {
        Ok(packet) => packet,
        Err(_) => Packet::response("command was dropped"),
    };

    if let Err(e) = write_packet(&mut stream, &reply).await {
        warn!(error = %e, "unable to write control response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoolsync_core::types::PacketType;

    #[tokio::test]
    async fn request_and_reply_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("control.sock");
        let listener = Listener::bind_at(&socket).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(listener.serve(tx));
        // Echoing dispatcher.
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let text = format!("handled {:?}", request.packet.kind);
                let _ = request.reply.send(Packet::response(text));
            }
        });

        let reply = crate::client::send_to(
            &socket,
            &Packet { kind: PacketType::Sync, message: String::new() },
        )
        .await
        .unwrap();

        assert_eq!(reply.kind, PacketType::Response);
        assert_eq!(reply.message, "handled Sync");
    }

    #[tokio::test]
    async fn rebinding_replaces_a_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("control.sock");

        let first = Listener::bind_at(&socket).unwrap();
        drop(first);
        // The file is still there; binding again must succeed.
        assert!(socket.exists());
        let second = Listener::bind_at(&socket).unwrap();
        assert_eq!(second.path(), socket.as_path());
    }

    #[tokio::test]
    async fn socket_is_world_writable() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("control.sock");
        let _listener = Listener::bind_at(&socket).unwrap();

        let mode = std::fs::metadata(&socket).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }
}
