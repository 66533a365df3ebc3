//! Object resolution: turning named address/service groups into tokens.
//!
//! Resolution is an external collaborator. The analyzers never call a
//! resolver; it is consulted once per row during normalization, and every
//! call carries a deadline.

mod cached;
mod table;

pub use cached::CachedResolver;
pub use table::StaticResolver;

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Namespace a named object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Address objects and address groups
    Address,
    /// Service objects and service groups
    Service,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Address => "address",
            ObjectKind::Service => "service",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single resolver lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Member tokens of the object; members may name further objects.
    Found(Vec<String>),
    /// The object does not exist.
    NotFound,
    /// The backing store did not answer before the deadline.
    TimedOut,
}

/// Resolver trait for named address and service objects.
///
/// Implementations only resolve one level; nested groups are expanded by
/// the caller, which also guards against cycles.
pub trait ObjectResolver: Send + Sync {
    /// Look up the members of `name`, giving up at `deadline`.
    fn resolve(&self, kind: ObjectKind, name: &str, deadline: Instant) -> Resolution;
}

impl<R: ObjectResolver + ?Sized> ObjectResolver for &R {
    fn resolve(&self, kind: ObjectKind, name: &str, deadline: Instant) -> Resolution {
        (**self).resolve(kind, name, deadline)
    }
}

impl<R: ObjectResolver + ?Sized> ObjectResolver for std::sync::Arc<R> {
    fn resolve(&self, kind: ObjectKind, name: &str, deadline: Instant) -> Resolution {
        (**self).resolve(kind, name, deadline)
    }
}

/// Resolver that knows no objects; every name is unresolved.
///
/// Used for ad-hoc query literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl ObjectResolver for NoResolver {
    fn resolve(&self, _kind: ObjectKind, _name: &str, _deadline: Instant) -> Resolution {
        Resolution::NotFound
    }
}
