//! Address and service matchers.
//!
//! Both matchers turn a list of tokens into a canonical interval-set form,
//! expanding named objects through an [`ObjectResolver`]. All relations used
//! by the analyzers (containment, intersection, "any") are computed on that
//! canonical form only.

mod address;
pub mod interval;
mod name;
mod service;

pub use address::{AddressSet, AddressToken};
pub use interval::{Bound, Interval, IntervalSet};
pub use name::NameSet;
pub use service::{Protocol, ServiceSet, ServiceToken};

use ahash::{AHashMap, AHashSet};
use std::time::{Duration, Instant};

use crate::error::MatchError;
use crate::resolver::{ObjectKind, ObjectResolver, Resolution};

/// Default nesting guard for group expansion.
pub const DEFAULT_MAX_GROUP_DEPTH: usize = 32;

/// A parsed token that is either a literal or a reference to a named object.
pub(crate) trait Token: Sized + Clone {
    /// Namespace the token's named references live in.
    const KIND: ObjectKind;

    /// Classify and parse a raw token.
    fn parse(raw: &str) -> Result<Self, MatchError>;

    /// Object name, when the token is a reference.
    fn reference(&self) -> Option<&str>;
}

/// Options for resolving a token list.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Absolute deadline handed to the resolver.
    pub deadline: Instant,
    /// Maximum group nesting depth.
    pub max_depth: usize,
}

impl ResolveOptions {
    /// Options with a deadline `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            max_depth: DEFAULT_MAX_GROUP_DEPTH,
        }
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }
}

/// Expands named references into literal tokens.
///
/// Keeps the chain of groups currently being expanded so a name that
/// reappears on its own chain is reported as a cycle, and memoizes finished
/// groups so diamond-shaped group graphs are expanded once.
pub(crate) struct Expander<'a, R: ?Sized, T> {
    resolver: &'a R,
    options: ResolveOptions,
    chain: Vec<String>,
    on_chain: AHashSet<String>,
    memo: AHashMap<String, Vec<T>>,
}

impl<'a, R: ObjectResolver + ?Sized, T: Token> Expander<'a, R, T> {
    pub(crate) fn new(resolver: &'a R, options: ResolveOptions) -> Self {
        Self {
            resolver,
            options,
            chain: Vec::new(),
            on_chain: AHashSet::new(),
            memo: AHashMap::new(),
        }
    }

    /// Expand raw tokens into literal tokens.
    pub(crate) fn expand<S: AsRef<str>>(&mut self, raw_tokens: &[S]) -> Result<Vec<T>, MatchError> {
        let mut out = Vec::new();
        for raw in raw_tokens {
            self.expand_token(raw.as_ref(), &mut out)?;
        }
        Ok(out)
    }

    fn expand_token(&mut self, raw: &str, out: &mut Vec<T>) -> Result<(), MatchError> {
        let token = T::parse(raw)?;
        let Some(name) = token.reference() else {
            out.push(token);
            return Ok(());
        };
        let name = name.to_string();

        if let Some(members) = self.memo.get(&name) {
            out.extend(members.iter().cloned());
            return Ok(());
        }

        if self.on_chain.contains(&name) {
            let mut chain = self.chain.clone();
            chain.push(name);
            return Err(MatchError::CyclicReference { chain });
        }

        if self.chain.len() >= self.options.max_depth {
            log::warn!(
                "{} group nesting deeper than {} at {}",
                T::KIND,
                self.options.max_depth,
                name
            );
            return Err(MatchError::unresolved(&name));
        }

        if Instant::now() >= self.options.deadline {
            return Err(MatchError::unresolved(&name));
        }

        let members = match self.resolver.resolve(T::KIND, &name, self.options.deadline) {
            Resolution::Found(members) => members,
            Resolution::NotFound => return Err(MatchError::unresolved(&name)),
            Resolution::TimedOut => {
                log::warn!("{} object lookup timed out: {}", T::KIND, name);
                return Err(MatchError::unresolved(&name));
            }
        };

        self.chain.push(name.clone());
        self.on_chain.insert(name.clone());

        let mut expanded = Vec::new();
        for member in &members {
            self.expand_token(member, &mut expanded)?;
        }

        self.chain.pop();
        self.on_chain.remove(&name);

        out.extend(expanded.iter().cloned());
        self.memo.insert(name, expanded);
        Ok(())
    }
}

/// Split a tabular cell into tokens on commas and line breaks.
pub(crate) fn split_cell(cell: &str) -> impl Iterator<Item = &str> {
    cell.split([',', '\n', '\r', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
