// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// spoolsync — sends one command to the running spoolsyncd over the
// control socket and prints the reply.

use clap::{Parser, Subcommand};

use spoolsync_core::error::{Error, Result};
use spoolsync_core::types::{Packet, PacketType};

#[derive(Parser)]
#[command(name = "spoolsync", version, about = "Control client for spoolsyncd")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a sync now, optionally for extra usernames beyond the
    /// currently logged-in ones
    Sync {
        /// Additional usernames to sync printers for
        usernames: Vec<String>,
    },
    /// Delete every tracked printer from the spooler and reset the
    /// tracking cache
    ClearCache,
    /// List the spooler's driver catalog
    ListDrivers,
}

fn command_packet(command: &Command) -> Result<Packet> {
    let packet = match command {
        Command::Sync { usernames } => {
            let message =
                if usernames.is_empty() { String::new() } else { serde_json::to_string(usernames)? };
            Packet { kind: PacketType::Sync, message }
        }
        Command::ClearCache => Packet { kind: PacketType::ClearCache, message: String::new() },
        Command::ListDrivers => Packet { kind: PacketType::ListDrivers, message: String::new() },
    };
    Ok(packet)
}

async fn run(cli: Cli) -> Result<String> {
    let packet = command_packet(&cli.command)?;
    let reply = spoolsync_control::client::send(&packet).await?;
    Ok(reply.message)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(message) => println!("{message}"),
        Err(e) => {
            eprintln!("error: {e}");
            if matches!(e, Error::Control(_)) {
                eprintln!("Is spoolsyncd running?");
            }
            std::process::exit(1);
        }
    }
}
