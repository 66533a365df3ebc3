//! Error types for fwaudit.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Error type for crate-level operations (config, I/O, analysis runs).
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker pool could not be built
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Analysis was cancelled; partial results were discarded
    #[error("analysis cancelled")]
    Cancelled,
}

/// Result type alias for fwaudit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for address/service token resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// Malformed literal token (bad CIDR, reversed range, non-numeric port)
    #[error("invalid token {token:?}: {reason}")]
    TokenSyntax { token: String, reason: String },

    /// Named object unknown to the resolver, or the lookup timed out
    #[error("unresolved reference: {name}")]
    UnresolvedReference { name: String },

    /// Group chain refers back to itself
    #[error("cyclic reference: {}", chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },
}

impl MatchError {
    pub(crate) fn syntax(token: &str, reason: impl Into<String>) -> Self {
        MatchError::TokenSyntax {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(name: &str) -> Self {
        MatchError::UnresolvedReference {
            name: name.to_string(),
        }
    }

    /// Get the diagnostic kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchError::TokenSyntax { .. } => ErrorKind::TokenSyntax,
            MatchError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            MatchError::CyclicReference { .. } => ErrorKind::CyclicReference,
        }
    }
}

/// Diagnostic classification of a row-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TokenSyntax,
    UnresolvedReference,
    CyclicReference,
    Validation,
}

impl ErrorKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TokenSyntax => "token_syntax",
            ErrorKind::UnresolvedReference => "unresolved_reference",
            ErrorKind::CyclicReference => "cyclic_reference",
            ErrorKind::Validation => "validation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule field a validation error is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Id,
    Order,
    Enabled,
    Action,
    Source,
    Destination,
    Service,
}

impl RuleField {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleField::Id => "id",
            RuleField::Order => "order",
            RuleField::Enabled => "enabled",
            RuleField::Action => "action",
            RuleField::Source => "source",
            RuleField::Destination => "destination",
            RuleField::Service => "service",
        }
    }
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-level normalization failure.
///
/// Matcher errors (including cyclic group references) degrade to this type
/// at the normalizer; `kind` keeps the original classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: RuleField,
    pub reason: String,
    pub kind: ErrorKind,
}

impl ValidationError {
    /// Create a plain validation error for a field.
    pub fn new(field: RuleField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
            kind: ErrorKind::Validation,
        }
    }

    /// Wrap a matcher error raised while resolving a field.
    pub fn from_match(field: RuleField, err: MatchError) -> Self {
        Self {
            field,
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}
