//! Service matcher: protocol/port tokens and canonical service sets.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

use super::interval::{Interval, IntervalSet};
use super::{Expander, ResolveOptions, Token};
use crate::error::MatchError;
use crate::resolver::{NoResolver, ObjectKind, ObjectResolver};

/// `<protocol>` or `<protocol>/<ports>`, already lowercased.
static SERVICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z][a-z0-9-]*)(?:/(.*))?$").unwrap());

/// `<port>` or `<low>-<high>`.
static PORT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)(?:-(\d+))?$").unwrap());

/// IP protocol of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// Any other IP protocol, by IANA number
    Other(u8),
}

impl Protocol {
    /// Parse a protocol name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            "icmp" => Some(Protocol::Icmp),
            "icmpv6" | "ipv6-icmp" => Some(Protocol::Other(58)),
            "gre" => Some(Protocol::Other(47)),
            "esp" => Some(Protocol::Other(50)),
            "ah" => Some(Protocol::Other(51)),
            "sctp" => Some(Protocol::Other(132)),
            _ => None,
        }
    }

    /// IANA protocol number.
    pub fn number(&self) -> u8 {
        match self {
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
            Protocol::Icmp => 1,
            Protocol::Other(n) => *n,
        }
    }

    /// Build from an IANA protocol number.
    pub fn from_number(n: u8) -> Self {
        match n {
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            1 => Protocol::Icmp,
            n => Protocol::Other(n),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
            Protocol::Icmp => f.write_str("icmp"),
            Protocol::Other(58) => f.write_str("icmpv6"),
            Protocol::Other(47) => f.write_str("gre"),
            Protocol::Other(50) => f.write_str("esp"),
            Protocol::Other(51) => f.write_str("ah"),
            Protocol::Other(132) => f.write_str("sctp"),
            Protocol::Other(n) => write!(f, "proto-{n}"),
        }
    }
}

/// A single service token.
///
/// # Examples
/// ```
/// use fwaudit::matcher::{Protocol, ServiceToken};
///
/// assert_eq!(ServiceToken::parse("any").unwrap(), ServiceToken::Any);
/// assert!(matches!(
///     ServiceToken::parse("TCP/80").unwrap(),
///     ServiceToken::Ports { protocol: Protocol::Tcp, .. }
/// ));
/// assert!(ServiceToken::parse("tcp/http").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceToken {
    /// Every protocol and port
    Any,
    /// A protocol with a port range; `None` means every port
    Ports {
        protocol: Protocol,
        ports: Option<Interval<u16>>,
    },
    /// A named service object or group
    Named(String),
}

impl ServiceToken {
    /// Parse a raw token.
    pub fn parse(raw: &str) -> Result<Self, MatchError> {
        let token = raw.trim();
        if token.is_empty() {
            return Err(MatchError::syntax(raw, "empty service token"));
        }

        let lower = token.to_lowercase();
        if matches!(lower.as_str(), "any" | "all" | "ip") {
            return Ok(ServiceToken::Any);
        }

        let Some(caps) = SERVICE_PATTERN.captures(&lower) else {
            if token.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(MatchError::syntax(token, "missing protocol"));
            }
            return Ok(ServiceToken::Named(token.to_string()));
        };

        let protocol = Protocol::parse(&caps[1]);
        let Some(port_spec) = caps.get(2) else {
            return Ok(match protocol {
                Some(protocol) => ServiceToken::Ports {
                    protocol,
                    ports: None,
                },
                None => ServiceToken::Named(token.to_string()),
            });
        };

        let Some(protocol) = protocol else {
            return Err(MatchError::syntax(
                token,
                format!("unknown protocol {:?}", &caps[1]),
            ));
        };

        Ok(ServiceToken::Ports {
            protocol,
            ports: parse_ports(token, port_spec.as_str().trim())?,
        })
    }
}

impl Token for ServiceToken {
    const KIND: ObjectKind = ObjectKind::Service;

    fn parse(raw: &str) -> Result<Self, MatchError> {
        ServiceToken::parse(raw)
    }

    fn reference(&self) -> Option<&str> {
        match self {
            ServiceToken::Named(name) => Some(name),
            _ => None,
        }
    }
}

fn parse_ports(token: &str, spec: &str) -> Result<Option<Interval<u16>>, MatchError> {
    if spec == "any" {
        return Ok(None);
    }

    let caps = PORT_PATTERN
        .captures(spec)
        .ok_or_else(|| MatchError::syntax(token, format!("invalid port {spec:?}")))?;

    let port = |s: &str| {
        s.parse::<u16>()
            .map_err(|_| MatchError::syntax(token, format!("port {s} out of range")))
    };
    let low = port(&caps[1])?;
    let high = match caps.get(2) {
        Some(m) => port(m.as_str())?,
        None => low,
    };

    Interval::try_new(low, high)
        .map(Some)
        .ok_or_else(|| MatchError::syntax(token, "port range start after range end"))
}

/// Canonical match-space of a service field.
///
/// "Any protocol" absorbs every per-protocol entry; otherwise each listed
/// protocol maps to a non-empty merged set of ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ServiceSet {
    any_protocol: bool,
    ports: BTreeMap<Protocol, IntervalSet<u16>>,
}

impl ServiceSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every protocol and port.
    pub fn any() -> Self {
        Self {
            any_protocol: true,
            ports: BTreeMap::new(),
        }
    }

    /// Build from already-expanded literal tokens.
    pub fn from_tokens<'a, I: IntoIterator<Item = &'a ServiceToken>>(tokens: I) -> Self {
        let mut intervals: BTreeMap<Protocol, Vec<Interval<u16>>> = BTreeMap::new();

        for token in tokens {
            match token {
                ServiceToken::Any => return Self::any(),
                ServiceToken::Ports { protocol, ports } => intervals
                    .entry(*protocol)
                    .or_default()
                    .push(ports.unwrap_or_else(Interval::full)),
                ServiceToken::Named(_) => {}
            }
        }

        Self {
            any_protocol: false,
            ports: intervals
                .into_iter()
                .map(|(protocol, ranges)| (protocol, IntervalSet::from_intervals(ranges)))
                .collect(),
        }
    }

    /// Resolve a token list into a service set, expanding named groups.
    pub fn resolve<R, S>(tokens: &[S], resolver: &R, options: ResolveOptions) -> Result<Self, MatchError>
    where
        R: ObjectResolver + ?Sized,
        S: AsRef<str>,
    {
        let literals: Vec<ServiceToken> = Expander::new(resolver, options).expand(tokens)?;
        Ok(Self::from_tokens(&literals))
    }

    /// Resolve literal tokens only; any name is an unresolved reference.
    pub fn parse_literals<S: AsRef<str>>(tokens: &[S]) -> Result<Self, MatchError> {
        Self::resolve(tokens, &NoResolver, ResolveOptions::default())
    }

    /// Ports of a protocol, `None` when the protocol is not listed.
    pub fn ports(&self, protocol: Protocol) -> Option<&IntervalSet<u16>> {
        self.ports.get(&protocol)
    }

    /// Listed protocols, ascending.
    pub fn protocols(&self) -> impl Iterator<Item = Protocol> + '_ {
        self.ports.keys().copied()
    }

    /// Check if `other ⊆ self`.
    pub fn contains(&self, other: &ServiceSet) -> bool {
        if self.any_protocol {
            return true;
        }
        if other.any_protocol {
            return false;
        }
        other.ports.iter().all(|(protocol, theirs)| {
            self.ports
                .get(protocol)
                .is_some_and(|ours| ours.contains(theirs))
        })
    }

    /// Check if the sets share at least one protocol/port.
    pub fn intersects(&self, other: &ServiceSet) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if self.any_protocol || other.any_protocol {
            return true;
        }
        other.ports.iter().any(|(protocol, theirs)| {
            self.ports
                .get(protocol)
                .is_some_and(|ours| ours.intersects(theirs))
        })
    }

    /// Check if the set is "any protocol".
    pub fn is_full(&self) -> bool {
        self.any_protocol
    }

    /// Mutual containment.
    pub fn equals(&self, other: &ServiceSet) -> bool {
        self.contains(other) && other.contains(self)
    }

    pub fn is_empty(&self) -> bool {
        !self.any_protocol && self.ports.is_empty()
    }

    /// Check if a single protocol/port is in the set.
    pub fn matches(&self, protocol: Protocol, port: u16) -> bool {
        self.any_protocol
            || self
                .ports
                .get(&protocol)
                .is_some_and(|ports| ports.contains_value(port))
    }
}

impl fmt::Display for ServiceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.any_protocol {
            return f.write_str("any");
        }
        let mut first = true;
        for (protocol, ports) in &self.ports {
            if ports.is_full() {
                if !first {
                    f.write_str(",")?;
                }
                write!(f, "{protocol}")?;
                first = false;
                continue;
            }
            for range in ports.intervals() {
                if !first {
                    f.write_str(",")?;
                }
                if range.low() == range.high() {
                    write!(f, "{protocol}/{}", range.low())?;
                } else {
                    write!(f, "{protocol}/{}-{}", range.low(), range.high())?;
                }
                first = false;
            }
        }
        Ok(())
    }
}
