//! Firewall vendor definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Vendor of the firewall a rule set was exported from.
///
/// Collection and syntax parsing happen upstream; the vendor only selects
/// small token clean-ups applied during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Palo Alto Networks
    #[serde(alias = "palo-alto", alias = "pan")]
    PaloAlto,
    /// SECUI NGF
    Ngf,
    /// SECUI MF2
    Mf2,
    /// Anything else
    #[default]
    Default,
}

impl Vendor {
    /// Parse a vendor from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "paloalto" | "palo-alto" | "pan" => Some(Vendor::PaloAlto),
            "ngf" => Some(Vendor::Ngf),
            "mf2" => Some(Vendor::Mf2),
            "default" => Some(Vendor::Default),
            _ => None,
        }
    }

    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::PaloAlto => "paloalto",
            Vendor::Ngf => "ngf",
            Vendor::Mf2 => "mf2",
            Vendor::Default => "default",
        }
    }

    /// Apply vendor-specific clean-up to a service token.
    ///
    /// Palo Alto exports write service objects with underscores where the
    /// object store uses dashes (`service_http` vs `service-http`).
    pub fn preprocess_service(&self, token: &str) -> String {
        match self {
            Vendor::PaloAlto => token.replace('_', "-"),
            _ => token.to_string(),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
