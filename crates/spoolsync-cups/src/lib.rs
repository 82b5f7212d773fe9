// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS spooler client. Implements the engine's `Spooler` trait over the
// CUPS system operations (CUPS-Get-Printers, CUPS-Add-Modify-Printer,
// CUPS-Delete-Printer, CUPS-Get-Default, CUPS-Set-Default, CUPS-Get-PPDs)
// plus `lpadmin` for per-printer options, which have no IPP equivalent.

pub mod catalog;
pub mod client;

pub use client::CupsClient;
