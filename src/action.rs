//! Rule action types.

use std::fmt;

use serde::{Serialize, Serializer};

/// Action represents what a firewall does with traffic matched by a rule.
///
/// Vendor actions other than allow/deny are kept as opaque lowercase tags;
/// they are only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Permit the traffic
    Allow,
    /// Block the traffic
    Deny,
    /// Any other vendor action
    Other(String),
}

impl Action {
    /// Parse an action from a string (case-insensitive).
    ///
    /// Returns `None` for an empty string.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "" => None,
            "allow" | "accept" | "permit" | "pass" => Some(Action::Allow),
            "deny" | "block" => Some(Action::Deny),
            _ => Some(Action::Other(s)),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
            Action::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
