// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolsync core — shared domain types, the unified error enum, and the
// environment-driven configuration used by the daemon and CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::{DriverConfig, Packet, PacketType, Printer, ResolvedDriver, SpoolerPrinter};
