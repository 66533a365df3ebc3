//! Redundancy analysis.
//!
//! Rule X is redundant with respect to rule Y when both carry the same action
//! and Y's match-space contains X's. The relation is about match-space only,
//! so it does not depend on rule order.

use ahash::AHashMap;
use serde::Serialize;

use super::{partition_enabled, sweep, SkippedRule, SweepOptions};
use crate::rule::Rule;
use crate::Result;

/// X (narrower) is covered by Y (broader) under the same action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RedundancyEdge {
    pub narrower_id: String,
    pub broader_id: String,
    /// Both rules have the same match-space.
    pub exact: bool,
}

/// A set of rules with identical match-space and action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedundancyGroup {
    /// 1-based group number, in order of the upper rule.
    pub group: usize,
    /// The lowest-order rule of the group.
    pub upper: String,
    /// The remaining rules, by order.
    pub lower: Vec<String>,
}

/// Output of [`analyze_redundancy`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RedundancyReport {
    pub edges: Vec<RedundancyEdge>,
    pub skipped: Vec<SkippedRule>,
}

impl RedundancyReport {
    /// Group exact duplicates.
    ///
    /// `rules` supplies the orders used to pick each group's upper rule.
    pub fn groups(&self, rules: &[Rule]) -> Vec<RedundancyGroup> {
        let orders: AHashMap<&str, u64> = rules.iter().map(|r| (r.id(), r.order())).collect();
        let order_of = |id: &str| orders.get(id).copied().unwrap_or(u64::MAX);

        let mut index: AHashMap<&str, usize> = AHashMap::new();
        let mut ids: Vec<&str> = Vec::new();
        let mut parent: Vec<usize> = Vec::new();

        // Equal match-space is transitive, so exact edges join into cliques.
        for edge in self.edges.iter().filter(|e| e.exact) {
            let a = intern(&mut index, &mut ids, &mut parent, &edge.narrower_id);
            let b = intern(&mut index, &mut ids, &mut parent, &edge.broader_id);
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[ra] = rb;
            }
        }

        let mut components: AHashMap<usize, Vec<&str>> = AHashMap::new();
        for (i, id) in ids.iter().enumerate() {
            let root = find(&mut parent, i);
            components.entry(root).or_default().push(*id);
        }

        let mut members: Vec<Vec<&str>> = components.into_values().collect();
        for group in &mut members {
            group.sort_by_key(|id| (order_of(id), *id));
        }
        members.sort_by_key(|group| (order_of(group[0]), group[0]));

        members
            .into_iter()
            .enumerate()
            .map(|(i, group)| RedundancyGroup {
                group: i + 1,
                upper: group[0].to_string(),
                lower: group[1..].iter().map(|id| id.to_string()).collect(),
            })
            .collect()
    }

    /// Ids of rules that are the narrower side of some edge.
    pub fn redundant_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.edges.iter().map(|e| e.narrower_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

fn intern<'a>(
    index: &mut AHashMap<&'a str, usize>,
    ids: &mut Vec<&'a str>,
    parent: &mut Vec<usize>,
    id: &'a str,
) -> usize {
    *index.entry(id).or_insert_with(|| {
        ids.push(id);
        parent.push(parent.len());
        parent.len() - 1
    })
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Find every redundant pair among the enabled rules.
///
/// Each unordered pair yields at most one edge. Equal match-spaces give an
/// `exact` edge whose broader side is the lower-order rule. Edges are sorted
/// by the narrower rule's order, then the broader rule's.
pub fn analyze_redundancy(rules: &[Rule], options: &SweepOptions) -> Result<RedundancyReport> {
    let (active, skipped) = partition_enabled(rules);
    log::info!(
        "Redundancy sweep over {} rules ({} disabled)",
        active.len(),
        skipped.len()
    );

    let mut found = sweep(active.len(), options, |i, out| {
        let x = active[i];
        for &y in &active[i + 1..] {
            if let Some(edge) = compare(x, y) {
                out.push(edge);
            }
        }
    })?;

    found.sort_by(|a, b| {
        (a.0.order(), a.1.order(), a.0.id(), a.1.id()).cmp(&(
            b.0.order(),
            b.1.order(),
            b.0.id(),
            b.1.id(),
        ))
    });

    let edges = found
        .into_iter()
        .map(|(narrower, broader, exact)| RedundancyEdge {
            narrower_id: narrower.id().to_string(),
            broader_id: broader.id().to_string(),
            exact,
        })
        .collect();

    Ok(RedundancyReport { edges, skipped })
}

/// Classify one pair as (narrower, broader, exact).
fn compare<'r>(x: &'r Rule, y: &'r Rule) -> Option<(&'r Rule, &'r Rule, bool)> {
    if x.action() != y.action() {
        return None;
    }
    match (y.covers(x), x.covers(y)) {
        (true, true) => {
            let (broader, narrower) = if (x.order(), x.id()) <= (y.order(), y.id()) {
                (x, y)
            } else {
                (y, x)
            };
            Some((narrower, broader, true))
        }
        (true, false) => Some((x, y, false)),
        (false, true) => Some((y, x, false)),
        (false, false) => None,
    }
}
