// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command dispatch loop: the single consumer of both the sync timer and
// the control socket. Running every command here, one at a time, is what
// keeps concurrent syncs impossible.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{info, warn};

use spoolsync_control::ControlRequest;
use spoolsync_core::types::{Packet, PacketType};
use spoolsync_engine::{Directory, Engine, Sessions, Spooler};

/// Run until the command channel closes. The timer deadline is re-armed
/// after every event, so a manual sync pushes the next scheduled one a
/// full interval out; the initial deadline fires immediately.
pub async fn run<D: Directory, S: Spooler, U: Sessions>(
    engine: Engine<D, S, U>,
    mut commands: mpsc::Receiver<ControlRequest>,
    interval: Duration,
) {
    let mut deadline = Instant::now();
    loop {
        tokio::select! {
            _ = time::sleep_until(deadline) => {
                info!("scheduled sync");
                if let Err(e) = engine.sync(&[]).await {
                    warn!(error = %e, "scheduled sync failed");
                }
            }
            request = commands.recv() => {
                let Some(request) = request else {
                    info!("command channel closed, stopping");
                    return;
                };
                let reply = handle(&engine, request.packet).await;
                // The client may have hung up; nothing to do about it.
                let _ = request.reply.send(reply);
            }
        }
        deadline = Instant::now() + interval;
    }
}

async fn handle<D: Directory, S: Spooler, U: Sessions>(
    engine: &Engine<D, S, U>,
    packet: Packet,
) -> Packet {
    match packet.kind {
        PacketType::Sync => {
            let users: Vec<String> = if packet.message.trim().is_empty() {
                Vec::new()
            } else {
                match serde_json::from_str(&packet.message) {
                    Ok(users) => users,
                    Err(e) => return Packet::response(format!("Invalid sync arguments: {e}")),
                }
            };
            match engine.sync(&users).await {
                Ok(_) => Packet::response("Sync completed successfully"),
                Err(e) => Packet::response(format!("Sync failed: {e}")),
            }
        }
        PacketType::ClearCache => match engine.clear_cache().await {
            Ok(_) => Packet::response("Cache cleared successfully"),
            Err(e) => Packet::response(format!("Clearing cache failed: {e}")),
        },
        PacketType::ListDrivers => match engine.list_drivers().await {
            Ok(catalog) => match serde_json::to_string_pretty(&catalog) {
                Ok(listing) => Packet::response(listing),
                Err(e) => Packet::response(format!("Listing drivers failed: {e}")),
            },
            Err(e) => Packet::response(format!("Listing drivers failed: {e}")),
        },
        PacketType::Response => Packet::response("unexpected packet type"),
    }
}
