// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// spoolsyncd — keeps the local CUPS spooler in sync with the printer
// directory service for whoever is logged in, on a timer and on demand
// through the control socket.

mod dispatch;
mod sessions;

use tokio::sync::mpsc;
use tracing::{error, info};

use spoolsync_control::Listener;
use spoolsync_core::config::Config;
use spoolsync_core::error::Result;
use spoolsync_cups::CupsClient;
use spoolsync_directory::DirectoryClient;
use spoolsync_engine::{CacheStore, Engine, EngineSettings};

use sessions::UtmpSessions;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("spoolsyncd starting");
    if let Err(e) = run().await {
        error!(error = %e, "spoolsyncd failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!(
        api_base = %config.api_base,
        cups_url = %config.cups_url,
        cache = %config.cache_path.display(),
        interval_secs = config.sync_interval.as_secs(),
        "configuration loaded"
    );

    let engine = Engine::new(
        DirectoryClient::new(&config.api_base),
        CupsClient::new(&config.cups_url)?,
        UtmpSessions,
        CacheStore::new(&config.cache_path),
        EngineSettings {
            retention: config.cache_retention,
            ignored_users: config.ignored_users.clone(),
        },
    );

    let listener = Listener::bind()?;
    let (commands_tx, commands_rx) = mpsc::channel(16);
    tokio::spawn(listener.serve(commands_tx));

    dispatch::run(engine, commands_rx, config.sync_interval).await;
    Ok(())
}
