//! Opaque name matcher for application and user columns.

use std::collections::BTreeSet;
use std::fmt;

/// A set of opaque, case-insensitive names where `any` is the wildcard.
///
/// Application ids and user groups carry no structure the analyzers can
/// reason about, so two names relate only by equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NameSet {
    /// Every name
    #[default]
    Any,
    /// An explicit list of lowercased names
    Names(BTreeSet<String>),
}

impl NameSet {
    /// Build from tokens. An empty list or an `any` token means every name.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut names = BTreeSet::new();
        for token in tokens {
            let name = token.as_ref().trim().to_lowercase();
            if name == "any" {
                return NameSet::Any;
            }
            if !name.is_empty() {
                names.insert(name);
            }
        }
        if names.is_empty() {
            NameSet::Any
        } else {
            NameSet::Names(names)
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, NameSet::Any)
    }

    /// Check if `other ⊆ self`.
    pub fn contains(&self, other: &NameSet) -> bool {
        match (self, other) {
            (NameSet::Any, _) => true,
            (NameSet::Names(_), NameSet::Any) => false,
            (NameSet::Names(a), NameSet::Names(b)) => b.is_subset(a),
        }
    }

    /// Check if some name is in both sets.
    pub fn intersects(&self, other: &NameSet) -> bool {
        match (self, other) {
            (NameSet::Any, _) | (_, NameSet::Any) => true,
            (NameSet::Names(a), NameSet::Names(b)) => !a.is_disjoint(b),
        }
    }
}

impl fmt::Display for NameSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameSet::Any => f.write_str("any"),
            NameSet::Names(names) => {
                let joined: Vec<&str> = names.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}
