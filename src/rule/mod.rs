//! Canonical rule representation.

mod raw;

pub use raw::{Cell, RawRule, Tokens};

use crate::matcher::{AddressSet, NameSet, ServiceSet};
use crate::Action;

/// A normalized firewall rule.
///
/// Rules are produced once by the normalizer and never mutated; every
/// analyzer works on this typed form only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    id: String,
    order: u64,
    enabled: bool,
    action: Action,
    source: AddressSet,
    destination: AddressSet,
    service: ServiceSet,
    application: NameSet,
    user: NameSet,
}

impl Rule {
    /// Create an enabled rule that matches any application and user.
    pub fn new(
        id: impl Into<String>,
        order: u64,
        action: Action,
        source: AddressSet,
        destination: AddressSet,
        service: ServiceSet,
    ) -> Self {
        Self {
            id: id.into(),
            order,
            enabled: true,
            action,
            source,
            destination,
            service,
            application: NameSet::Any,
            user: NameSet::Any,
        }
    }

    /// Restrict the rule to the given applications.
    pub fn with_application(mut self, application: NameSet) -> Self {
        self.application = application;
        self
    }

    /// Restrict the rule to the given users or user groups.
    pub fn with_user(mut self, user: NameSet) -> Self {
        self.user = user;
        self
    }

    /// Mark the rule as disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Evaluation priority; lower evaluates first.
    pub fn order(&self) -> u64 {
        self.order
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn source(&self) -> &AddressSet {
        &self.source
    }

    pub fn destination(&self) -> &AddressSet {
        &self.destination
    }

    pub fn service(&self) -> &ServiceSet {
        &self.service
    }

    pub fn application(&self) -> &NameSet {
        &self.application
    }

    pub fn user(&self) -> &NameSet {
        &self.user
    }

    /// Check if every packet matching `other` also matches this rule.
    ///
    /// Rule matching is a conjunction of the match fields, so containment
    /// of the match-spaces is exactly per-field containment.
    pub fn covers(&self, other: &Rule) -> bool {
        self.source.contains(&other.source)
            && self.destination.contains(&other.destination)
            && self.service.contains(&other.service)
            && self.application.contains(&other.application)
            && self.user.contains(&other.user)
    }

    /// Check if some packet matches both rules.
    pub fn overlaps(&self, other: &Rule) -> bool {
        self.source.intersects(&other.source)
            && self.destination.intersects(&other.destination)
            && self.service.intersects(&other.service)
            && self.application.intersects(&other.application)
            && self.user.intersects(&other.user)
    }
}
