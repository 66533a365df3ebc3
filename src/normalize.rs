//! Rule normalization: raw tabular rows to canonical rules.
//!
//! Each row is normalized independently. A malformed field fails that row
//! only; the batch pass records a [`Diagnostic`] and keeps going, so the
//! analyzers never see anything but valid rules.

use std::time::Duration;

use ahash::AHashSet;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::{ErrorKind, RuleField, ValidationError};
use crate::matcher::{AddressSet, NameSet, ResolveOptions, ServiceSet, DEFAULT_MAX_GROUP_DEPTH};
use crate::resolver::ObjectResolver;
use crate::rule::{Cell, RawRule, Rule, Tokens};
use crate::{Action, Vendor};

/// One rejected row of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Zero-based position of the row in the input.
    pub row_index: usize,
    pub error_kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    fn new(row_index: usize, err: &ValidationError) -> Self {
        Self {
            row_index,
            error_kind: err.kind,
            message: err.to_string(),
        }
    }
}

/// Result of a batch normalization pass.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    /// Valid rules, in input order.
    pub rules: Vec<Rule>,
    /// One entry per rejected row.
    pub diagnostics: Vec<Diagnostic>,
}

/// Converts raw rows into rules, resolving named objects on the way.
#[derive(Debug, Clone)]
pub struct Normalizer<R> {
    resolver: R,
    vendor: Vendor,
    timeout: Duration,
    max_depth: usize,
}

impl<R: ObjectResolver> Normalizer<R> {
    /// Create a normalizer with default vendor, timeout and depth guard.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            vendor: Vendor::Default,
            timeout: Duration::from_millis(crate::config::DEFAULT_RESOLVER_TIMEOUT_MS),
            max_depth: DEFAULT_MAX_GROUP_DEPTH,
        }
    }

    /// Create a normalizer from an analysis config.
    pub fn from_config(resolver: R, config: &AnalysisConfig) -> Self {
        Self {
            resolver,
            vendor: config.vendor,
            timeout: config.resolver_timeout(),
            max_depth: config.max_group_depth,
        }
    }

    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = vendor;
        self
    }

    /// Set the per-row deadline handed to the resolver.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Normalize a single row.
    ///
    /// `row_index` is the zero-based position of the row; it supplies the
    /// order when the row has none.
    pub fn normalize(&self, raw: &RawRule, row_index: usize) -> Result<Rule, ValidationError> {
        let id = parse_id(raw.id.as_ref())?;
        let order = parse_order(raw.order.as_ref(), row_index)?;
        let enabled = parse_enabled(raw.enabled.as_ref())?;
        let action = parse_action(raw.action.as_ref())?;

        // One deadline per row, shared by all three fields.
        let options = ResolveOptions {
            deadline: std::time::Instant::now() + self.timeout,
            max_depth: self.max_depth,
        };

        let source = self.address_field(raw.source_tokens(), RuleField::Source, options)?;
        let destination =
            self.address_field(raw.destination_tokens(), RuleField::Destination, options)?;
        let service = self.service_field(raw.service_tokens(), options)?;
        let application = name_field(raw.application.as_ref());
        let user = name_field(raw.user.as_ref());

        Ok(Rule::new(id, order, action, source, destination, service)
            .with_application(application)
            .with_user(user)
            .with_enabled(enabled))
    }

    /// Normalize every row, collecting failures as diagnostics.
    ///
    /// Rows repeating an earlier row's id or order are rejected.
    pub fn normalize_batch(&self, rows: &[RawRule]) -> NormalizeOutcome {
        let mut outcome = NormalizeOutcome::default();
        let mut seen_ids = AHashSet::new();
        let mut seen_orders = AHashSet::new();

        for (row_index, raw) in rows.iter().enumerate() {
            let result = self.normalize(raw, row_index).and_then(|rule| {
                if seen_ids.contains(rule.id()) {
                    return Err(ValidationError::new(
                        RuleField::Id,
                        format!("duplicate rule id {:?}", rule.id()),
                    ));
                }
                if seen_orders.contains(&rule.order()) {
                    return Err(ValidationError::new(
                        RuleField::Order,
                        format!("duplicate order {}", rule.order()),
                    ));
                }
                Ok(rule)
            });

            match result {
                Ok(rule) => {
                    seen_ids.insert(rule.id().to_string());
                    seen_orders.insert(rule.order());
                    outcome.rules.push(rule);
                }
                Err(err) => {
                    log::warn!("Skipping row {}: {}", row_index, err);
                    outcome.diagnostics.push(Diagnostic::new(row_index, &err));
                }
            }
        }

        log::info!(
            "Normalized {} rules ({} rows rejected)",
            outcome.rules.len(),
            outcome.diagnostics.len()
        );
        outcome
    }

    fn address_field(
        &self,
        tokens: Option<&Tokens>,
        field: RuleField,
        options: ResolveOptions,
    ) -> Result<AddressSet, ValidationError> {
        let tokens = tokens.map(Tokens::to_vec).unwrap_or_default();
        if tokens.is_empty() {
            return Ok(AddressSet::any());
        }
        AddressSet::resolve(&tokens, &self.resolver, options)
            .map_err(|e| ValidationError::from_match(field, e))
    }

    fn service_field(
        &self,
        tokens: Option<&Tokens>,
        options: ResolveOptions,
    ) -> Result<ServiceSet, ValidationError> {
        let tokens: Vec<String> = tokens
            .map(Tokens::to_vec)
            .unwrap_or_default()
            .iter()
            .map(|t| self.vendor.preprocess_service(t))
            .collect();
        if tokens.is_empty() {
            return Ok(ServiceSet::any());
        }
        ServiceSet::resolve(&tokens, &self.resolver, options)
            .map_err(|e| ValidationError::from_match(RuleField::Service, e))
    }
}

fn name_field(tokens: Option<&Tokens>) -> NameSet {
    NameSet::from_tokens(&tokens.map(Tokens::to_vec).unwrap_or_default())
}

fn parse_id(cell: Option<&Cell>) -> Result<String, ValidationError> {
    let id = cell.map(Cell::as_text).unwrap_or_default();
    if id.is_empty() {
        return Err(ValidationError::new(RuleField::Id, "missing rule id"));
    }
    Ok(id)
}

fn parse_order(cell: Option<&Cell>, row_index: usize) -> Result<u64, ValidationError> {
    let fallback = row_index as u64 + 1;
    match cell {
        None => Ok(fallback),
        Some(Cell::Int(i)) => {
            u64::try_from(*i).map_err(|_| ValidationError::new(RuleField::Order, "negative order"))
        }
        Some(Cell::Float(f)) if *f >= 0.0 && f.fract() == 0.0 && *f < u64::MAX as f64 => {
            Ok(*f as u64)
        }
        Some(Cell::Text(s)) if s.trim().is_empty() => Ok(fallback),
        Some(Cell::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| ValidationError::new(RuleField::Order, format!("not a number: {:?}", s))),
        Some(other) => Err(ValidationError::new(
            RuleField::Order,
            format!("not a number: {}", other),
        )),
    }
}

fn parse_enabled(cell: Option<&Cell>) -> Result<bool, ValidationError> {
    match cell {
        None => Ok(true),
        Some(Cell::Bool(b)) => Ok(*b),
        Some(other) => match other.as_text().to_lowercase().as_str() {
            "" | "y" | "yes" | "true" | "1" => Ok(true),
            "n" | "no" | "false" | "0" => Ok(false),
            s => Err(ValidationError::new(
                RuleField::Enabled,
                format!("expected Y/N, got {:?}", s),
            )),
        },
    }
}

fn parse_action(cell: Option<&Cell>) -> Result<Action, ValidationError> {
    cell.and_then(|c| Action::parse(&c.as_text()))
        .ok_or_else(|| ValidationError::new(RuleField::Action, "missing action"))
}
