//! Policy filter: select rules by address and service queries.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matcher::{AddressSet, ServiceSet};
use crate::rule::Rule;

/// How per-field matches combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every specified field must match.
    #[default]
    And,
    /// At least one specified field must match.
    Or,
}

impl MatchMode {
    /// Parse a mode from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "and" => Some(MatchMode::And),
            "or" => Some(MatchMode::Or),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::And => "and",
            MatchMode::Or => "or",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query for [`filter`]. Unset fields take no part in the combination.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub source: Option<AddressSet>,
    pub destination: Option<AddressSet>,
    pub service: Option<ServiceSet>,
    pub mode: MatchMode,
    /// Let wildcard rule fields satisfy a narrow query.
    pub include_any: bool,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: AddressSet) -> Self {
        self.source = Some(source);
        self
    }

    pub fn destination(mut self, destination: AddressSet) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn service(mut self, service: ServiceSet) -> Self {
        self.service = Some(service);
        self
    }

    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn include_any(mut self, include_any: bool) -> Self {
        self.include_any = include_any;
        self
    }

    /// Check if no field is specified.
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.destination.is_none() && self.service.is_none()
    }

    /// Check a single rule against the query.
    pub fn matches(&self, rule: &Rule) -> bool {
        let mut results = Vec::with_capacity(3);
        if let Some(query) = &self.source {
            results.push(self.address_matches(rule.source(), query));
        }
        if let Some(query) = &self.destination {
            results.push(self.address_matches(rule.destination(), query));
        }
        if let Some(query) = &self.service {
            results.push(self.field_matches(
                rule.service().intersects(query),
                rule.service().is_full(),
                query.is_full(),
            ));
        }

        if results.is_empty() {
            return true;
        }
        match self.mode {
            MatchMode::And => results.iter().all(|&m| m),
            MatchMode::Or => results.iter().any(|&m| m),
        }
    }

    fn address_matches(&self, field: &AddressSet, query: &AddressSet) -> bool {
        if self.include_any {
            return field.intersects(query);
        }
        // Judged per family, so `any4` never hides a specific IPv6 entry.
        field.intersects_specific(query)
    }

    fn field_matches(&self, intersects: bool, field_is_any: bool, query_is_any: bool) -> bool {
        if !intersects {
            return false;
        }
        // A wildcard rule field alone does not satisfy a narrow query.
        self.include_any || !field_is_any || query_is_any
    }
}

/// Select the rules matching `criteria`, ordered by rule order.
///
/// Disabled rules are included; the caller decides what to do with them.
pub fn filter<'r>(rules: &'r [Rule], criteria: &FilterCriteria) -> Vec<&'r Rule> {
    let mut matched: Vec<&Rule> = rules.iter().filter(|r| criteria.matches(r)).collect();
    matched.sort_by(|a, b| (a.order(), a.id()).cmp(&(b.order(), b.id())));
    log::debug!("Filter matched {} of {} rules", matched.len(), rules.len());
    matched
}

/// Ids of the rules matching `criteria`, ordered by rule order.
pub fn filter_ids(rules: &[Rule], criteria: &FilterCriteria) -> Vec<String> {
    filter(rules, criteria)
        .into_iter()
        .map(|r| r.id().to_string())
        .collect()
}

/// Aggregate view of a filter result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSummary {
    pub total_rules: usize,
    pub matched_rules: usize,
    /// Matched share of all rules, 0-100.
    pub match_percentage: f64,
    pub enabled_matched: usize,
    pub action_distribution: BTreeMap<String, usize>,
}

impl FilterSummary {
    pub fn new(rules: &[Rule], matched: &[&Rule]) -> Self {
        let mut action_distribution = BTreeMap::new();
        for rule in matched {
            *action_distribution
                .entry(rule.action().to_string())
                .or_insert(0) += 1;
        }
        let match_percentage = if rules.is_empty() {
            0.0
        } else {
            matched.len() as f64 / rules.len() as f64 * 100.0
        };
        Self {
            total_rules: rules.len(),
            matched_rules: matched.len(),
            match_percentage,
            enabled_matched: matched.iter().filter(|r| r.is_enabled()).count(),
            action_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Action;

    fn addr(tokens: &[&str]) -> AddressSet {
        AddressSet::parse_literals(tokens).unwrap()
    }

    fn svc(tokens: &[&str]) -> ServiceSet {
        ServiceSet::parse_literals(tokens).unwrap()
    }

    fn rules() -> Vec<Rule> {
        vec![
            Rule::new("web", 2, Action::Allow, addr(&["any"]), addr(&["10.0.1.10"]), svc(&["tcp/443"])),
            Rule::new("any", 9, Action::Deny, AddressSet::any(), AddressSet::any(), ServiceSet::any()),
            Rule::new("lan", 1, Action::Allow, addr(&["192.168.1.0/24"]), addr(&["any"]), svc(&["udp/53"])),
            Rule::new("old", 5, Action::Allow, addr(&["192.168.1.100"]), addr(&["10.0.0.0/8"]), svc(&["tcp/22"]))
                .disabled(),
        ]
    }

    #[test]
    fn test_wildcard_excluded_unless_requested() {
        let rules = rules();
        let criteria = FilterCriteria::new().source(addr(&["192.168.1.100"]));
        assert_eq!(filter_ids(&rules, &criteria), vec!["lan", "old"]);

        let criteria = criteria.include_any(true);
        assert_eq!(filter_ids(&rules, &criteria), vec!["lan", "web", "old", "any"]);
    }

    #[test]
    fn test_wildcard_query_matches_wildcard_rule() {
        let rules = rules();
        let criteria = FilterCriteria::new().source(AddressSet::any());
        assert_eq!(filter_ids(&rules, &criteria), vec!["lan", "web", "old", "any"]);
    }

    #[test]
    fn test_single_family_wildcard_keeps_specific_entries() {
        let mut rules = rules();
        rules.push(Rule::new(
            "mixed",
            3,
            Action::Allow,
            addr(&["any4", "2001:db8::/32"]),
            AddressSet::any(),
            ServiceSet::any(),
        ));

        let v6 = FilterCriteria::new().source(addr(&["2001:db8::1"]));
        assert_eq!(filter_ids(&rules, &v6), vec!["mixed"]);

        // Only the any4 entry overlaps an IPv4 query.
        let v4 = FilterCriteria::new().source(addr(&["10.9.9.9"]));
        assert!(filter_ids(&rules, &v4).is_empty());
        assert_eq!(
            filter_ids(&rules, &v4.include_any(true)),
            vec!["web", "mixed", "any"]
        );
    }

    #[test]
    fn test_and_or_modes() {
        let rules = rules();
        let criteria = FilterCriteria::new()
            .destination(addr(&["10.0.1.10"]))
            .service(svc(&["tcp/22"]));
        assert_eq!(filter_ids(&rules, &criteria), vec!["old"]);

        let criteria = criteria.mode(MatchMode::Or);
        assert_eq!(filter_ids(&rules, &criteria), vec!["web", "old"]);
    }

    #[test]
    fn test_empty_criteria_matches_all() {
        let rules = rules();
        assert!(FilterCriteria::new().is_empty());
        assert_eq!(filter(&rules, &FilterCriteria::new()).len(), 4);
    }

    #[test]
    fn test_summary() {
        let rules = rules();
        let criteria = FilterCriteria::new().source(addr(&["192.168.1.100"]));
        let matched = filter(&rules, &criteria);
        let summary = FilterSummary::new(&rules, &matched);

        assert_eq!(summary.total_rules, 4);
        assert_eq!(summary.matched_rules, 2);
        assert_eq!(summary.match_percentage, 50.0);
        assert_eq!(summary.enabled_matched, 1);
        assert_eq!(summary.action_distribution.get("allow"), Some(&2));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(MatchMode::parse("OR"), Some(MatchMode::Or));
        assert_eq!(MatchMode::parse("and"), Some(MatchMode::And));
        assert_eq!(MatchMode::parse("xor"), None);
    }
}
