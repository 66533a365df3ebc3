//! Address matcher: address tokens and canonical address sets.

use ipnet::IpNet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::interval::{Interval, IntervalSet};
use super::{Expander, ResolveOptions, Token};
use crate::error::MatchError;
use crate::resolver::{NoResolver, ObjectKind, ObjectResolver};

/// A single address token.
///
/// # Examples
/// ```
/// use fwaudit::matcher::AddressToken;
///
/// assert!(matches!(AddressToken::parse("any").unwrap(), AddressToken::Any));
/// assert!(matches!(AddressToken::parse("10.0.0.0/8").unwrap(), AddressToken::Network(_)));
/// assert!(matches!(AddressToken::parse("web-servers").unwrap(), AddressToken::Named(_)));
/// assert!(AddressToken::parse("10.0.0.9-10.0.0.1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressToken {
    /// Every IPv4 and IPv6 address
    Any,
    /// Every IPv4 address
    AnyV4,
    /// Every IPv6 address
    AnyV6,
    /// A single address
    Host(IpAddr),
    /// A CIDR block (host bits already cleared)
    Network(IpNet),
    /// An inclusive range within one address family
    Range(IpAddr, IpAddr),
    /// A named address object or group
    Named(String),
}

impl AddressToken {
    /// Parse a raw token.
    ///
    /// Tokens made only of hex digits, `.`, `:`, `/` and `-` that start with
    /// a digit or contain `:` are literals and must parse; anything else is a
    /// reference to a named object.
    pub fn parse(raw: &str) -> Result<Self, MatchError> {
        let token = raw.trim();
        if token.is_empty() {
            return Err(MatchError::syntax(raw, "empty address token"));
        }

        match token.to_lowercase().as_str() {
            "any" | "all" => return Ok(AddressToken::Any),
            "any4" | "any-ipv4" => return Ok(AddressToken::AnyV4),
            "any6" | "any-ipv6" => return Ok(AddressToken::AnyV6),
            _ => {}
        }

        if !looks_literal(token) {
            return Ok(AddressToken::Named(token.to_string()));
        }

        if let Some((addr, prefix)) = token.split_once('/') {
            return parse_network(token, addr, prefix).map(AddressToken::Network);
        }

        if let Some((start, end)) = token.split_once('-') {
            let start = parse_ip(token, start)?;
            let end = parse_ip(token, end)?;
            return match (start, end) {
                (IpAddr::V4(s), IpAddr::V4(e)) if s > e => {
                    Err(MatchError::syntax(token, "range start after range end"))
                }
                (IpAddr::V6(s), IpAddr::V6(e)) if s > e => {
                    Err(MatchError::syntax(token, "range start after range end"))
                }
                (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                    Ok(AddressToken::Range(start, end))
                }
                _ => Err(MatchError::syntax(token, "range mixes IPv4 and IPv6")),
            };
        }

        parse_ip(token, token).map(AddressToken::Host)
    }
}

impl Token for AddressToken {
    const KIND: ObjectKind = ObjectKind::Address;

    fn parse(raw: &str) -> Result<Self, MatchError> {
        AddressToken::parse(raw)
    }

    fn reference(&self) -> Option<&str> {
        match self {
            AddressToken::Named(name) => Some(name),
            _ => None,
        }
    }
}

fn looks_literal(token: &str) -> bool {
    let charset_ok = token
        .chars()
        .all(|c| c.is_ascii_hexdigit() || matches!(c, '.' | ':' | '/' | '-'));
    let starts_numeric = token.starts_with(|c: char| c.is_ascii_digit());
    charset_ok && (token.contains(':') || (starts_numeric && token.contains('.')))
}

fn parse_ip(token: &str, s: &str) -> Result<IpAddr, MatchError> {
    s.trim()
        .parse::<IpAddr>()
        .map_err(|_| MatchError::syntax(token, format!("invalid IP address {:?}", s.trim())))
}

/// Parse `addr/prefix` or `addr/netmask`, tolerating host bits.
fn parse_network(token: &str, addr: &str, prefix: &str) -> Result<IpNet, MatchError> {
    let ip = parse_ip(token, addr)?;
    let prefix = prefix.trim();

    let prefix_len = match (prefix.parse::<u8>(), ip) {
        (Ok(len), _) => len,
        (Err(_), IpAddr::V4(_)) => {
            let mask: Ipv4Addr = prefix
                .parse()
                .map_err(|_| MatchError::syntax(token, "invalid prefix length"))?;
            netmask_prefix(u32::from(mask))
                .ok_or_else(|| MatchError::syntax(token, "non-contiguous netmask"))?
        }
        (Err(_), IpAddr::V6(_)) => {
            return Err(MatchError::syntax(token, "invalid prefix length"));
        }
    };

    IpNet::new(ip, prefix_len)
        .map(|net| net.trunc())
        .map_err(|_| MatchError::syntax(token, "invalid prefix length"))
}

/// Prefix length of a contiguous IPv4 netmask.
fn netmask_prefix(mask: u32) -> Option<u8> {
    let ones = mask.leading_ones();
    let expected = u32::MAX.checked_shl(32 - ones).unwrap_or(0);
    (mask == expected).then_some(ones as u8)
}

/// Canonical match-space of an address field.
///
/// IPv4 and IPv6 are independent spaces; a relation holds for the set
/// when it holds in both families (containment) or in either (intersection).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AddressSet {
    v4: IntervalSet<u32>,
    v6: IntervalSet<u128>,
}

impl AddressSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every IPv4 and IPv6 address.
    pub fn any() -> Self {
        Self {
            v4: IntervalSet::full(),
            v6: IntervalSet::full(),
        }
    }

    /// Build from already-expanded literal tokens.
    ///
    /// Named tokens have no addresses of their own and contribute nothing.
    pub fn from_tokens<'a, I: IntoIterator<Item = &'a AddressToken>>(tokens: I) -> Self {
        let mut v4 = Vec::new();
        let mut v6 = Vec::new();

        for token in tokens {
            match token {
                AddressToken::Any => {
                    v4.push(Interval::full());
                    v6.push(Interval::full());
                }
                AddressToken::AnyV4 => v4.push(Interval::full()),
                AddressToken::AnyV6 => v6.push(Interval::full()),
                AddressToken::Host(IpAddr::V4(ip)) => v4.push(Interval::single(u32::from(*ip))),
                AddressToken::Host(IpAddr::V6(ip)) => v6.push(Interval::single(u128::from(*ip))),
                AddressToken::Network(IpNet::V4(net)) => v4.push(Interval::new(
                    u32::from(net.network()),
                    u32::from(net.broadcast()),
                )),
                AddressToken::Network(IpNet::V6(net)) => v6.push(Interval::new(
                    u128::from(net.network()),
                    u128::from(net.broadcast()),
                )),
                AddressToken::Range(IpAddr::V4(s), IpAddr::V4(e)) => {
                    v4.push(Interval::new(u32::from(*s), u32::from(*e)))
                }
                AddressToken::Range(IpAddr::V6(s), IpAddr::V6(e)) => {
                    v6.push(Interval::new(u128::from(*s), u128::from(*e)))
                }
                AddressToken::Range(_, _) | AddressToken::Named(_) => {}
            }
        }

        Self {
            v4: IntervalSet::from_intervals(v4),
            v6: IntervalSet::from_intervals(v6),
        }
    }

    /// Resolve a token list into an address set, expanding named groups.
    ///
    /// The result is the union of every token's addresses.
    pub fn resolve<R, S>(tokens: &[S], resolver: &R, options: ResolveOptions) -> Result<Self, MatchError>
    where
        R: ObjectResolver + ?Sized,
        S: AsRef<str>,
    {
        let literals: Vec<AddressToken> = Expander::new(resolver, options).expand(tokens)?;
        Ok(Self::from_tokens(&literals))
    }

    /// Resolve literal tokens only; any name is an unresolved reference.
    pub fn parse_literals<S: AsRef<str>>(tokens: &[S]) -> Result<Self, MatchError> {
        Self::resolve(tokens, &NoResolver, ResolveOptions::default())
    }

    /// IPv4 part of the set.
    pub fn v4(&self) -> &IntervalSet<u32> {
        &self.v4
    }

    /// IPv6 part of the set.
    pub fn v6(&self) -> &IntervalSet<u128> {
        &self.v6
    }

    /// Check if `other ⊆ self`.
    pub fn contains(&self, other: &AddressSet) -> bool {
        self.v4.contains(&other.v4) && self.v6.contains(&other.v6)
    }

    /// Check if the sets share at least one address.
    pub fn intersects(&self, other: &AddressSet) -> bool {
        self.v4.intersects(&other.v4) || self.v6.intersects(&other.v6)
    }

    /// Check if the set is every IPv4 and IPv6 address.
    pub fn is_full(&self) -> bool {
        self.v4.is_full() && self.v6.is_full()
    }

    /// Check if the sets share an address in some family, not counting a
    /// family `self` covers whole unless `other` covers it whole as well.
    ///
    /// This is the per-family form of "matched by a wildcard": `any4` paired
    /// with an IPv6 range still matches IPv6 queries through the range.
    pub fn intersects_specific(&self, other: &AddressSet) -> bool {
        let v4 = self.v4.intersects(&other.v4) && (!self.v4.is_full() || other.v4.is_full());
        let v6 = self.v6.intersects(&other.v6) && (!self.v6.is_full() || other.v6.is_full());
        v4 || v6
    }

    /// Mutual containment.
    pub fn equals(&self, other: &AddressSet) -> bool {
        self.contains(other) && other.contains(self)
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }

    /// Check if a single address is in the set.
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.v4.contains_value(u32::from(v4)),
            IpAddr::V6(v6) => self.v6.contains_value(u128::from(v6)),
        }
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_full() {
            return f.write_str("any");
        }
        let v4 = self
            .v4
            .intervals()
            .iter()
            .map(|r| (IpAddr::from(Ipv4Addr::from(r.low())), IpAddr::from(Ipv4Addr::from(r.high()))));
        let v6 = self
            .v6
            .intervals()
            .iter()
            .map(|r| (IpAddr::from(Ipv6Addr::from(r.low())), IpAddr::from(Ipv6Addr::from(r.high()))));

        for (idx, (low, high)) in v4.chain(v6).enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            if low == high {
                write!(f, "{low}")?;
            } else {
                write!(f, "{low}-{high}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;

    fn set(tokens: &[&str]) -> AddressSet {
        AddressSet::parse_literals(tokens).unwrap()
    }

    #[test]
    fn test_token_classification() {
        assert_eq!(AddressToken::parse("ANY").unwrap(), AddressToken::Any);
        assert_eq!(AddressToken::parse("any4").unwrap(), AddressToken::AnyV4);
        assert_eq!(
            AddressToken::parse("10.1.1.1").unwrap(),
            AddressToken::Host("10.1.1.1".parse().unwrap())
        );
        assert_eq!(
            AddressToken::parse("web-servers").unwrap(),
            AddressToken::Named("web-servers".to_string())
        );
        assert_eq!(
            AddressToken::parse("cafe.bad").unwrap(),
            AddressToken::Named("cafe.bad".to_string())
        );
        assert!(matches!(
            AddressToken::parse("fe80::/10").unwrap(),
            AddressToken::Network(_)
        ));
    }

    #[test]
    fn test_invalid_literals() {
        for bad in ["10.0.0.0/33", "10.0.0.300", "10.0.0.9-10.0.0.1", "10.0.0.1-::1", "1.2.3/24", ""] {
            assert!(
                matches!(AddressToken::parse(bad), Err(MatchError::TokenSyntax { .. })),
                "{bad:?} should be a syntax error"
            );
        }
    }

    #[test]
    fn test_cidr_expansion() {
        let s = set(&["10.0.0.0/24"]);
        assert_eq!(
            s.v4().intervals(),
            &[Interval::new(0x0A00_0000, 0x0A00_00FF)]
        );
        assert!(s.v6().is_empty());
    }

    #[test]
    fn test_host_bits_truncated() {
        assert_eq!(set(&["10.0.0.77/24"]), set(&["10.0.0.0/24"]));
    }

    #[test]
    fn test_netmask_form() {
        assert_eq!(set(&["192.168.1.0/255.255.255.0"]), set(&["192.168.1.0/24"]));
        assert!(AddressSet::parse_literals(&["192.168.1.0/255.0.255.0"]).is_err());
    }

    #[test]
    fn test_range_and_union() {
        let s = set(&["10.0.0.0-10.0.0.127", "10.0.0.128/25"]);
        assert_eq!(s, set(&["10.0.0.0/24"]));
    }

    #[test]
    fn test_contains() {
        let broad = set(&["10.0.0.0/24"]);
        assert!(broad.contains(&set(&["10.0.0.5"])));
        assert!(broad.contains(&set(&["10.0.0.128/25"])));
        assert!(!broad.contains(&set(&["10.0.1.0"])));
        assert!(AddressSet::any().contains(&broad));
        assert!(!broad.contains(&AddressSet::any()));
    }

    #[test]
    fn test_any_families() {
        let any4 = set(&["any4"]);
        assert!(any4.contains(&set(&["0.0.0.0/0"])));
        assert!(!any4.contains(&set(&["2001:db8::1"])));
        assert!(!any4.is_full());
        assert!(set(&["any"]).is_full());
        assert!(set(&["0.0.0.0/0", "::/0"]).is_full());
    }

    #[test]
    fn test_intersects_specific() {
        let mixed = set(&["any4", "2001:db8::/32"]);
        assert!(mixed.intersects_specific(&set(&["2001:db8::1"])));
        assert!(!mixed.intersects_specific(&set(&["10.0.0.1"])));
        assert!(mixed.intersects_specific(&set(&["any4"])));
        assert!(!mixed.intersects_specific(&set(&["2001:db9::1"])));

        let any = AddressSet::any();
        assert!(!any.intersects_specific(&set(&["10.0.0.1", "2001:db8::1"])));
        assert!(any.intersects_specific(&set(&["any6"])));
        assert!(set(&["10.0.0.0/8"]).intersects_specific(&any));
    }

    #[test]
    fn test_intersects_across_families() {
        let mixed = set(&["10.0.0.0/8", "2001:db8::/32"]);
        assert!(mixed.intersects(&set(&["2001:db8::5"])));
        assert!(!mixed.intersects(&set(&["192.168.0.1", "fc00::1"])));
    }

    #[test]
    fn test_contains_ip() {
        let s = set(&["10.0.0.0/24", "fc00::/7"]);
        assert!(s.contains_ip("10.0.0.9".parse().unwrap()));
        assert!(s.contains_ip("fd00::1".parse().unwrap()));
        assert!(!s.contains_ip("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_unresolved_without_resolver() {
        assert_eq!(
            AddressSet::parse_literals(&["web"]),
            Err(MatchError::UnresolvedReference {
                name: "web".to_string()
            })
        );
    }

    #[test]
    fn test_nested_groups() {
        let resolver = StaticResolver::new()
            .with_address("web", ["10.0.0.10", "10.0.0.11"])
            .with_address("db", ["10.0.1.0/24"])
            .with_address("servers", ["web", "db"]);

        let s = AddressSet::resolve(&["servers"], &resolver, ResolveOptions::default()).unwrap();
        assert_eq!(s, set(&["10.0.0.10-10.0.0.11", "10.0.1.0/24"]));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let resolver = StaticResolver::new()
            .with_address("shared", ["10.9.9.9"])
            .with_address("left", ["shared"])
            .with_address("right", ["shared"])
            .with_address("top", ["left", "right"]);

        let s = AddressSet::resolve(&["top", "shared"], &resolver, ResolveOptions::default()).unwrap();
        assert_eq!(s, set(&["10.9.9.9"]));
    }

    #[test]
    fn test_cycle_detected() {
        let resolver = StaticResolver::new()
            .with_address("a", ["b"])
            .with_address("b", ["10.0.0.1", "c"])
            .with_address("c", ["a"]);

        let err = AddressSet::resolve(&["a"], &resolver, ResolveOptions::default()).unwrap_err();
        assert_eq!(
            err,
            MatchError::CyclicReference {
                chain: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_self_reference() {
        let resolver = StaticResolver::new().with_address("loop", ["loop"]);
        assert!(matches!(
            AddressSet::resolve(&["loop"], &resolver, ResolveOptions::default()),
            Err(MatchError::CyclicReference { .. })
        ));
    }

    #[test]
    fn test_depth_guard() {
        let mut resolver = StaticResolver::new();
        for i in 0..10 {
            resolver.insert(ObjectKind::Address, &format!("g{i}"), [format!("g{}", i + 1)]);
        }
        resolver.insert(ObjectKind::Address, "g10", ["10.0.0.1"]);

        let shallow = ResolveOptions {
            max_depth: 4,
            ..ResolveOptions::default()
        };
        assert!(matches!(
            AddressSet::resolve(&["g0"], &resolver, shallow),
            Err(MatchError::UnresolvedReference { .. })
        ));
        assert!(AddressSet::resolve(&["g0"], &resolver, ResolveOptions::default()).is_ok());
    }

    #[test]
    fn test_expired_deadline_is_unresolved() {
        let resolver = StaticResolver::new().with_address("web", ["10.0.0.1"]);
        let expired = ResolveOptions {
            deadline: std::time::Instant::now(),
            max_depth: 8,
        };
        assert!(matches!(
            AddressSet::resolve(&["web"], &resolver, expired),
            Err(MatchError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(set(&["any"]).to_string(), "any");
        assert_eq!(
            set(&["10.0.0.1", "10.0.1.0/24"]).to_string(),
            "10.0.0.1,10.0.1.0-10.0.1.255"
        );
    }
}
