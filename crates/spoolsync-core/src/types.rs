// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Domain types shared between the engine, the collaborators, and the
// control channel.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A desired printer record as published by the directory service.
///
/// Printers are created transiently per reconciliation run and never
/// persisted; only their (sanitized) ids live on in the expiring cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Printer {
    /// Opaque identifier, unique per printer. Must be passed through
    /// [`sanitize_id`] before any spooler call or cache lookup.
    pub id: String,
    /// Device URI template with a single `%s` slot for the hostname,
    /// e.g. `socket://%s:9100` or `ipp://%s/ipp/print`.
    pub uri_template: String,
    /// The physical device address substituted into the template.
    pub hostname: String,
    /// Human-readable printer name shown in print dialogs.
    #[serde(default)]
    pub name: String,
    /// Human-readable location.
    #[serde(default)]
    pub location: String,
    /// Driver configuration. `None` makes the printer unusable and is
    /// rejected as a configuration error during reconciliation.
    #[serde(default)]
    pub driver: Option<DriverConfig>,
}

impl Printer {
    /// The device URI handed to the spooler: the template with its one
    /// `%s` slot filled with the device hostname.
    pub fn device_uri(&self) -> String {
        self.uri_template.replacen("%s", &self.hostname, 1)
    }

    /// Display name, honouring a non-empty driver override.
    pub fn display_name(&self) -> &str {
        match self.driver.as_ref().and_then(|d| d.name.as_deref()) {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }

    /// Location, honouring a non-empty driver override.
    pub fn display_location(&self) -> &str {
        match self.driver.as_ref().and_then(|d| d.location.as_deref()) {
            Some(location) if !location.is_empty() => location,
            _ => &self.location,
        }
    }

    /// Default-election priority; printers without a driver block never
    /// reach the election, so the fallback value is inconsequential.
    pub fn default_priority(&self) -> i32 {
        self.driver.as_ref().map_or(0, |d| d.default_priority)
    }
}

/// Driver settings for a desired printer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Ordered driver-catalog lookup keys (`ppd-make-and-model`). The
    /// first key present in the catalog wins; misses fall through.
    #[serde(default)]
    pub driver_names: Vec<String>,
    /// Register via the spooler's driverless "everywhere" path when no
    /// candidate resolves, instead of rejecting the printer.
    #[serde(default)]
    pub fallback_everywhere: bool,
    /// Higher priority wins the default-printer election.
    #[serde(default)]
    pub default_priority: i32,
    /// Spooler options applied with `lpadmin` after create/update.
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// Display-name override; wins over `Printer::name` when non-empty.
    #[serde(default)]
    pub name: Option<String>,
    /// Location override; wins over `Printer::location` when non-empty.
    #[serde(default)]
    pub location: Option<String>,
}

/// Outcome of driver resolution for one printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedDriver {
    /// A catalog entry matched; the value is the spooler's driver name
    /// (`ppd-name`).
    Catalog(String),
    /// No candidate matched but the printer allows the driverless path.
    Everywhere,
}

/// A printer as currently registered with the spooler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolerPrinter {
    /// The spooler-side printer name (matches a sanitized desired id
    /// when the printer is managed by us).
    pub id: String,
    /// The full device URI the spooler reports for this printer.
    pub device_uri: String,
}

/// Strip a directory-service printer id down to the alphabet the
/// spooler preserves on its local-printer creation path. Using the
/// unsanitized id anywhere would break equality checks against the
/// spooler's view.
pub fn sanitize_id(id: &str) -> String {
    id.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// A control-protocol message. Clients write exactly one packet and
/// read exactly one `Response` packet back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// The command (or `Response` for replies).
    #[serde(rename = "type")]
    pub kind: PacketType,
    /// JSON-encoded argument (explicit usernames for `Sync`), or the
    /// free-text result for `Response`.
    #[serde(rename = "msg", default)]
    pub message: String,
}

impl Packet {
    /// A response packet carrying the given result text.
    pub fn response(message: impl Into<String>) -> Self {
        Self { kind: PacketType::Response, message: message.into() }
    }
}

/// Control packet discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacketType {
    Sync,
    ClearCache,
    ListDrivers,
    Response,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_non_alphanumerics() {
        assert_eq!(sanitize_id("Lab-Printer_1!"), "LabPrinter1");
        assert_eq!(sanitize_id("plain42"), "plain42");
        assert_eq!(sanitize_id("---"), "");
    }

    #[test]
    fn device_uri_substitutes_hostname() {
        let p = Printer {
            id: "P1".into(),
            uri_template: "socket://%s:9100".into(),
            hostname: "10.0.0.5".into(),
            name: String::new(),
            location: String::new(),
            driver: None,
        };
        assert_eq!(p.device_uri(), "socket://10.0.0.5:9100");
    }

    #[test]
    fn driver_overrides_win_when_non_empty() {
        let mut p = Printer {
            id: "P1".into(),
            uri_template: "socket://%s".into(),
            hostname: "h".into(),
            name: "Front desk".into(),
            location: "Lobby".into(),
            driver: Some(DriverConfig {
                name: Some("Front Desk (PCL)".into()),
                location: Some(String::new()),
                ..DriverConfig::default()
            }),
        };
        assert_eq!(p.display_name(), "Front Desk (PCL)");
        // Empty override falls back to the printer-level value.
        assert_eq!(p.display_location(), "Lobby");

        p.driver = None;
        assert_eq!(p.display_name(), "Front desk");
    }

    #[test]
    fn packet_round_trips_as_json() {
        let packet = Packet { kind: PacketType::Sync, message: r#"["alice"]"#.into() };
        let encoded = serde_json::to_string(&packet).unwrap();
        assert!(encoded.contains(r#""type":"sync""#));
        let decoded: Packet = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn packet_message_defaults_to_empty() {
        let decoded: Packet = serde_json::from_str(r#"{"type":"clear-cache"}"#).unwrap();
        assert_eq!(decoded.kind, PacketType::ClearCache);
        assert!(decoded.message.is_empty());
    }

    #[test]
    fn printer_decodes_directory_payload() {
        let json = r#"{
            "id": "lib-laser-1",
            "uri_template": "socket://%s:9100",
            "hostname": "10.1.2.3",
            "name": "Library Laser",
            "location": "Library",
            "driver": {
                "driver_names": ["HP LaserJet 4050 Series", "Generic PCL Laser Printer"],
                "fallback_everywhere": true,
                "default_priority": 10,
                "options": {"media": "a4"}
            }
        }"#;
        let p: Printer = serde_json::from_str(json).unwrap();
        let driver = p.driver.as_ref().unwrap();
        assert_eq!(driver.driver_names.len(), 2);
        assert!(driver.fallback_everywhere);
        assert_eq!(p.default_priority(), 10);
        assert_eq!(driver.options["media"], "a4");
    }

    #[test]
    fn printer_driver_is_optional() {
        let json = r#"{"id": "x", "uri_template": "ipp://%s", "hostname": "h"}"#;
        let p: Printer = serde_json::from_str(json).unwrap();
        assert!(p.driver.is_none());
        assert_eq!(p.default_priority(), 0);
    }
}
