//! In-memory object table resolver.

use ahash::AHashMap;
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;

use super::{ObjectKind, ObjectResolver, Resolution};
use crate::Result;

/// On-disk layout of an object table.
#[derive(Debug, Default, Deserialize)]
struct ObjectTable {
    #[serde(default)]
    addresses: AHashMap<String, Vec<String>>,
    #[serde(default)]
    services: AHashMap<String, Vec<String>>,
}

/// StaticResolver answers lookups from in-memory object tables.
///
/// # Examples
/// ```
/// use fwaudit::resolver::{ObjectKind, ObjectResolver, Resolution, StaticResolver};
/// use std::time::{Duration, Instant};
///
/// let resolver = StaticResolver::new()
///     .with_address("web", ["10.0.0.10", "10.0.0.11"])
///     .with_service("web-ports", ["tcp/80", "tcp/443"]);
///
/// let deadline = Instant::now() + Duration::from_secs(1);
/// assert!(matches!(
///     resolver.resolve(ObjectKind::Address, "web", deadline),
///     Resolution::Found(_)
/// ));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addresses: AHashMap<String, Vec<String>>,
    services: AHashMap<String, Vec<String>>,
}

impl StaticResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address object or group.
    pub fn with_address<I, S>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(ObjectKind::Address, name, members);
        self
    }

    /// Add a service object or group.
    pub fn with_service<I, S>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(ObjectKind::Service, name, members);
        self
    }

    /// Insert or replace an object.
    pub fn insert<I, S>(&mut self, kind: ObjectKind, name: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members.into_iter().map(Into::into).collect();
        self.table_mut(kind).insert(name.trim().to_string(), members);
    }

    /// Load object tables from YAML (JSON is valid YAML).
    ///
    /// ```yaml
    /// addresses:
    ///   web: [10.0.0.10, 10.0.0.11]
    /// services:
    ///   web-ports: [tcp/80, tcp/443]
    /// ```
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let table: ObjectTable = serde_yaml::from_str(content)?;
        log::debug!(
            "Loaded object table: {} address objects, {} service objects",
            table.addresses.len(),
            table.services.len()
        );
        Ok(Self {
            addresses: table.addresses,
            services: table.services,
        })
    }

    /// Load object tables from a YAML or JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Get the number of objects of a kind.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.table(kind).len()
    }

    fn table(&self, kind: ObjectKind) -> &AHashMap<String, Vec<String>> {
        match kind {
            ObjectKind::Address => &self.addresses,
            ObjectKind::Service => &self.services,
        }
    }

    fn table_mut(&mut self, kind: ObjectKind) -> &mut AHashMap<String, Vec<String>> {
        match kind {
            ObjectKind::Address => &mut self.addresses,
            ObjectKind::Service => &mut self.services,
        }
    }
}

impl ObjectResolver for StaticResolver {
    fn resolve(&self, kind: ObjectKind, name: &str, _deadline: Instant) -> Resolution {
        match self.table(kind).get(name) {
            Some(members) => Resolution::Found(members.clone()),
            None => Resolution::NotFound,
        }
    }
}
