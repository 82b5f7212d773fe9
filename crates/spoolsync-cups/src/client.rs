// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async CUPS client.
//
// Uses the `ipp` crate's async API to send the CUPS system operations:
//   - CUPS-Get-Printers        (0x4002)
//   - CUPS-Add-Modify-Printer  (0x4003)
//   - CUPS-Delete-Printer      (0x4004)
//   - CUPS-Get-Default         (0x4001)
//   - CUPS-Set-Default         (0x400A)
//   - CUPS-Get-PPDs            (0x400C)
// Printer options are applied through `lpadmin -o`, which has no IPP
// equivalent.

use std::collections::{BTreeMap, HashMap};

use ipp::prelude::*;
use tokio::process::Command;
use tracing::{debug, info};

use spoolsync_core::error::{Error, Result};
use spoolsync_core::types::{Printer, ResolvedDriver, SpoolerPrinter};
use spoolsync_engine::{RetryStrategy, Spooler};

use crate::catalog::{DEFAULT_TTL, DriverCatalogCache};

/// The `ppd-name` CUPS reserves for driverless IPP Everywhere setup.
const PPD_EVERYWHERE: &str = "everywhere";

/// Async CUPS client bound to one scheduler.
///
/// All IPP traffic goes to the scheduler URI; printer-uri attributes use
/// the scheduler's canonical local form. CUPS authorizes the system
/// operations by peer credentials, so the requesting-user-name attribute
/// carries the daemon's own user.
pub struct CupsClient {
    server_uri: Uri,
    requesting_user: String,
    retry: RetryStrategy,
    catalog: DriverCatalogCache,
}

impl CupsClient {
    /// A client for the scheduler at `cups_url` (e.g. `http://localhost:631`).
    pub fn new(cups_url: &str) -> Result<Self> {
        let server_uri: Uri = cups_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid CUPS URL '{cups_url}': {e}")))?;
        Ok(Self {
            server_uri,
            requesting_user: std::env::var("USER").unwrap_or_else(|_| "root".to_string()),
            retry: RetryStrategy::default(),
            catalog: DriverCatalogCache::new(DEFAULT_TTL),
        })
    }

    /// The scheduler-local printer URI for a sanitized printer id.
    fn printer_uri(&self, id: &str) -> Result<Uri> {
        format!("ipp://localhost/printers/{id}")
            .parse()
            .map_err(|e| Error::Spooler(format!("printer uri for '{id}': {e}")))
    }

    /// Build and send one CUPS request, retrying transport and server
    /// failures. `Error::NoDestinations` short-circuits: an empty
    /// scheduler will stay empty for the rest of the backoff window.
    async fn send_op(
        &self,
        operation: Operation,
        uri: Uri,
        attributes: Vec<(DelimiterTag, IppAttribute)>,
    ) -> Result<IppRequestResponse> {
        self.retry
            .run_when(
                |e| !matches!(e, Error::NoDestinations),
                move || self.send_once(operation.clone(), uri.clone(), attributes.clone()),
            )
            .await
    }

    async fn send_once(
        &self,
        operation: Operation,
        uri: Uri,
        attributes: Vec<(DelimiterTag, IppAttribute)>,
    ) -> Result<IppRequestResponse> {
        let mut request =
            IppRequestResponse::new(IppVersion::v1_1(), operation.clone(), Some(uri));
        request.attributes_mut().add(
            DelimiterTag::OperationAttributes,
            IppAttribute::new(
                "requesting-user-name",
                IppValue::NameWithoutLanguage(self.requesting_user.clone()),
            ),
        );
        for (group, attribute) in attributes {
            request.attributes_mut().add(group, attribute);
        }

        debug!(operation = ?operation, "sending CUPS operation");
        let client = AsyncIppClient::new(self.server_uri.clone());
        let response = client
            .send(request)
            .await
            .map_err(|e| Error::Spooler(format!("{operation:?}: {e}")))?;

        let code = response.header().status_code();
        if code == StatusCode::ClientErrorNotFound && not_found_means_empty(&operation) {
            return Err(Error::NoDestinations);
        }
        if !code.is_success() {
            return Err(Error::Spooler(format!("{operation:?} returned status {code:?}")));
        }
        Ok(response)
    }

    /// Apply the printer's spooler options via `lpadmin`. No options, no
    /// invocation.
    async fn apply_options(&self, printer: &Printer) -> Result<()> {
        let Some(config) = &printer.driver else { return Ok(()) };
        if config.options.is_empty() {
            return Ok(());
        }

        let args = lpadmin_args(&printer.id, &config.options);
        debug!(id = %printer.id, ?args, "applying printer options");
        let output = Command::new("lpadmin")
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Spooler(format!("lpadmin: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Spooler(format!(
                "lpadmin for {} failed: {}",
                printer.id,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Spooler for CupsClient {
    async fn get_printers(&self) -> Result<Vec<SpoolerPrinter>> {
        let attrs = vec![(
            DelimiterTag::OperationAttributes,
            requested_attributes(&["printer-name", "device-uri"]),
        )];
        let response = self
            .send_op(Operation::CupsGetPrinters, self.server_uri.clone(), attrs)
            .await?;
        Ok(parse_printers(response.attributes()))
    }

    async fn add_or_modify(&self, printer: &Printer, driver: &ResolvedDriver) -> Result<()> {
        let uri = self.printer_uri(&printer.id)?;
        let ppd_name = match driver {
            ResolvedDriver::Catalog(name) => name.clone(),
            ResolvedDriver::Everywhere => PPD_EVERYWHERE.to_string(),
        };
        info!(id = %printer.id, ppd = %ppd_name, uri = %printer.device_uri(),
            "adding/modifying printer");

        let attrs = vec![
            (
                DelimiterTag::PrinterAttributes,
                IppAttribute::new("ppd-name", IppValue::NameWithoutLanguage(ppd_name)),
            ),
            (
                DelimiterTag::PrinterAttributes,
                IppAttribute::new("printer-is-accepting-jobs", IppValue::Boolean(true)),
            ),
            // printer-state 3 = idle.
            (
                DelimiterTag::PrinterAttributes,
                IppAttribute::new("printer-state", IppValue::Enum(3)),
            ),
            (
                DelimiterTag::PrinterAttributes,
                IppAttribute::new(
                    "printer-info",
                    IppValue::TextWithoutLanguage(printer.display_name().to_string()),
                ),
            ),
            (
                DelimiterTag::PrinterAttributes,
                IppAttribute::new(
                    "printer-location",
                    IppValue::TextWithoutLanguage(printer.display_location().to_string()),
                ),
            ),
            (
                DelimiterTag::PrinterAttributes,
                IppAttribute::new("device-uri", IppValue::Uri(printer.device_uri())),
            ),
        ];
        self.send_op(Operation::CupsAddModifyPrinter, uri, attrs).await?;

        self.apply_options(printer).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let uri = self.printer_uri(id)?;
        info!(id = %id, "deleting printer");
        self.send_op(Operation::CupsDeletePrinter, uri, Vec::new()).await?;
        Ok(())
    }

    async fn get_default(&self) -> Result<Option<String>> {
        let attrs = vec![(
            DelimiterTag::OperationAttributes,
            requested_attributes(&["printer-name"]),
        )];
        match self.send_op(Operation::CupsGetDefault, self.server_uri.clone(), attrs).await {
            Ok(response) => Ok(parse_default(response.attributes())),
            // No default configured.
            Err(Error::NoDestinations) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_default(&self, id: &str) -> Result<()> {
        let uri = self.printer_uri(id)?;
        info!(id = %id, "setting default printer");
        self.send_op(Operation::CupsSetDefault, uri, Vec::new()).await?;
        Ok(())
    }

    async fn driver_catalog(&self) -> Result<BTreeMap<String, String>> {
        if let Some(catalog) = self.catalog.get() {
            return Ok(catalog);
        }

        let attrs = vec![(
            DelimiterTag::OperationAttributes,
            requested_attributes(&["ppd-name", "ppd-make-and-model"]),
        )];
        let response = self
            .send_op(Operation::CupsGetPPDs, self.server_uri.clone(), attrs)
            .await?;
        let catalog = parse_catalog(response.attributes());
        info!(entries = catalog.len(), "fetched driver catalog");

        self.catalog.store(catalog.clone());
        Ok(catalog)
    }

    fn invalidate_driver_catalog(&self) {
        self.catalog.clear();
    }
}

// ---------------------------------------------------------------------------
// Helper functions for building requests and parsing CUPS responses
// ---------------------------------------------------------------------------

/// Operations where a not-found status means "nothing configured" (an
/// empty scheduler, no default set) rather than a failed mutation. A
/// not-found on delete or set-default stays an ordinary spooler error.
fn not_found_means_empty(operation: &Operation) -> bool {
    matches!(operation, Operation::CupsGetPrinters | Operation::CupsGetDefault)
}

fn requested_attributes(names: &[&str]) -> IppAttribute {
    let values = names
        .iter()
        .map(|n| IppValue::Keyword(n.to_string()))
        .collect();
    IppAttribute::new("requested-attributes", IppValue::Array(values))
}

/// Each printer known to the scheduler comes back as its own Printer
/// Attributes group.
fn parse_printers(attrs: &IppAttributes) -> Vec<SpoolerPrinter> {
    let mut printers = Vec::new();
    for group in attrs.groups_of(DelimiterTag::PrinterAttributes) {
        let attributes = group.attributes();
        let Some(name) = attributes.get("printer-name") else {
            continue;
        };
        let device_uri = attributes
            .get("device-uri")
            .map(|a| a.value().to_string())
            .unwrap_or_default();
        printers.push(SpoolerPrinter { id: name.value().to_string(), device_uri });
    }
    printers
}

fn parse_default(attrs: &IppAttributes) -> Option<String> {
    attrs
        .groups_of(DelimiterTag::PrinterAttributes)
        .next()
        .and_then(|group| group.attributes().get("printer-name"))
        .map(|a| a.value().to_string())
}

/// CUPS-Get-PPDs reports one Printer Attributes group per PPD. Later
/// duplicates of a make-and-model overwrite earlier ones, matching the
/// scheduler's own listing order.
fn parse_catalog(attrs: &IppAttributes) -> BTreeMap<String, String> {
    let mut catalog = BTreeMap::new();
    for group in attrs.groups_of(DelimiterTag::PrinterAttributes) {
        let attributes = group.attributes();
        if let (Some(model), Some(name)) =
            (attributes.get("ppd-make-and-model"), attributes.get("ppd-name"))
        {
            catalog.insert(model.value().to_string(), name.value().to_string());
        }
    }
    catalog
}

/// `lpadmin -p <id> -o k=v ...` with options in sorted order so repeat
/// invocations are byte-identical.
fn lpadmin_args(id: &str, options: &HashMap<String, String>) -> Vec<String> {
    let sorted: BTreeMap<&String, &String> = options.iter().collect();
    let mut args = vec!["-p".to_string(), id.to_string()];
    for (key, value) in sorted {
        args.push("-o".to_string());
        args.push(format!("{key}={value}"));
    }
    args
}
