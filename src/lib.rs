//! fwaudit - Vendor-agnostic firewall rule analysis.
//!
//! This crate takes firewall rules that have already been collected and
//! exported as tabular rows, normalizes them into a typed form, and answers
//! three questions about the rule set:
//!
//! - **Redundancy**: which rules are covered by another rule with the same action
//! - **Shadowing**: which rules are made (partly) unreachable by earlier rules
//! - **Filtering**: which rules touch a given address or service
//!
//! # Features
//!
//! - **Interval arithmetic**: addresses and ports are canonical interval sets,
//!   so containment and intersection are linear sweeps
//! - **IPv4 and IPv6**: the two address families are independent spaces
//! - **Named objects**: address and service groups are expanded through an
//!   injected [`ObjectResolver`], with cycle detection and a depth guard
//! - **Parallel sweeps**: the pairwise analyzers run on rayon and honor a
//!   [`CancelToken`] between batches
//!
//! # Quick Start
//!
//! ```ignore
//! use fwaudit::{AnalysisConfig, Normalizer, PolicyAnalyzer, RawRule, StaticResolver};
//!
//! let rows = vec![
//!     RawRule::new("r1", 1).action("allow").source(["10.0.0.0/24"]).service(["tcp/80"]),
//!     RawRule::new("r2", 5).action("allow").source(["10.0.0.5"]).service(["tcp/80"]),
//! ];
//!
//! let outcome = Normalizer::new(StaticResolver::new()).normalize_batch(&rows);
//! let analyzer = PolicyAnalyzer::new(AnalysisConfig::default())?;
//! let report = analyzer.analyze(&outcome.rules)?;
//!
//! assert_eq!(report.redundancy[0].narrower_id, "r2");
//! assert_eq!(report.shadow[0].shadower_id, "r1");
//! ```
//!
//! # Token Syntax
//!
//! - **Addresses**: `any`, `any4`, `any6`, `10.0.0.1`, `10.0.0.0/24`,
//!   `10.0.0.0/255.255.255.0`, `10.0.0.1-10.0.0.9`, IPv6 equivalents, or a name
//! - **Services**: `any`, `tcp`, `tcp/any`, `tcp/80`, `udp/1000-2000`,
//!   `icmp`, or a name
//!
//! An empty cell means `any`.

mod action;
mod error;
mod vendor;

pub mod analysis;
pub mod config;
pub mod matcher;
pub mod normalize;
pub mod resolver;
pub mod rule;

// Re-export core types
pub use action::Action;
pub use error::{Error, ErrorKind, MatchError, Result, RuleField, ValidationError};
pub use vendor::Vendor;

// Re-export matcher types
pub use matcher::{
    AddressSet, AddressToken, NameSet, Protocol, ResolveOptions, ServiceSet, ServiceToken};

// Re-export resolvers
pub use resolver::{
    CachedResolver, NoResolver, ObjectKind, ObjectResolver, Resolution, StaticResolver,
};

// Re-export rule model and normalization
pub use normalize::{Diagnostic, NormalizeOutcome, Normalizer};
pub use rule::{RawRule, Rule};

// Re-export analyzers
pub use analysis::{
    analyze_redundancy, analyze_shadowing, filter, filter_ids, AnalysisReport, CancelToken,
    FilterCriteria, FilterSummary, MatchMode, PolicyAnalyzer, RedundancyEdge, RedundancyReport,
    ShadowEdge, ShadowKind, ShadowReport, SkippedRule, SweepOptions,
};
pub use config::AnalysisConfig;
