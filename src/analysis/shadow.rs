//! Shadow analysis.
//!
//! Rules are evaluated first-match-wins in ascending order. An earlier rule
//! shadows a later one fully when it covers the later rule's whole
//! match-space, and partially when the two match-spaces merely intersect.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use serde::Serialize;

use super::{partition_enabled, sweep, SkippedRule, SweepOptions};
use crate::rule::Rule;
use crate::Result;

/// How much of the shadowed rule's traffic the earlier rule takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowKind {
    /// The later rule is unreachable.
    Full,
    /// Some of the later rule's traffic is diverted.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ShadowEdge {
    pub shadowed_id: String,
    pub shadower_id: String,
    pub kind: ShadowKind,
    pub action_conflict: bool,
}

/// Rule with the number of rules it effectively shadows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowerCount {
    pub rule_id: String,
    pub count: usize,
}

/// Aggregate view of a shadow report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShadowSummary {
    /// Rules with at least one full shadower.
    pub total_shadowed: usize,
    /// Fully shadowed rules per action of the shadowed rule.
    pub shadowed_by_action: BTreeMap<String, usize>,
    /// Up to five rules that fully shadow the most others.
    pub top_shadowers: Vec<ShadowerCount>,
}

/// Output of [`analyze_shadowing`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShadowReport {
    pub edges: Vec<ShadowEdge>,
    pub skipped: Vec<SkippedRule>,
}

impl ShadowReport {
    /// The first full shadower of each fully shadowed rule.
    ///
    /// These are the edges to act on; the rest are kept for audit.
    pub fn effective_shadowers(&self) -> Vec<&ShadowEdge> {
        let mut seen = AHashSet::new();
        self.edges
            .iter()
            .filter(|e| e.kind == ShadowKind::Full)
            .filter(|e| seen.insert(e.shadowed_id.as_str()))
            .collect()
    }

    /// Summarize effective shadows against the analyzed rules.
    pub fn summary(&self, rules: &[Rule]) -> ShadowSummary {
        const TOP: usize = 5;

        let by_id: AHashMap<&str, &Rule> = rules.iter().map(|r| (r.id(), r)).collect();
        let effective = self.effective_shadowers();

        let mut shadowed_by_action = BTreeMap::new();
        let mut counts: AHashMap<&str, usize> = AHashMap::new();
        for edge in &effective {
            if let Some(rule) = by_id.get(edge.shadowed_id.as_str()) {
                *shadowed_by_action
                    .entry(rule.action().to_string())
                    .or_insert(0) += 1;
            }
            *counts.entry(edge.shadower_id.as_str()).or_insert(0) += 1;
        }

        let order_of = |id: &str| by_id.get(id).map(|r| r.order()).unwrap_or(u64::MAX);
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| order_of(a.0).cmp(&order_of(b.0)))
                .then_with(|| a.0.cmp(b.0))
        });

        ShadowSummary {
            total_shadowed: effective.len(),
            shadowed_by_action,
            top_shadowers: ranked
                .into_iter()
                .take(TOP)
                .map(|(rule_id, count)| ShadowerCount {
                    rule_id: rule_id.to_string(),
                    count,
                })
                .collect(),
        }
    }
}

/// Find every earlier enabled rule that shadows each enabled rule.
///
/// Edges are grouped by shadowed rule in ascending order, and within a
/// group by shadower order, so the first full edge is the effective one.
pub fn analyze_shadowing(rules: &[Rule], options: &SweepOptions) -> Result<ShadowReport> {
    let (mut active, skipped) = partition_enabled(rules);
    active.sort_by(|a, b| (a.order(), a.id()).cmp(&(b.order(), b.id())));
    log::info!(
        "Shadow sweep over {} rules ({} disabled)",
        active.len(),
        skipped.len()
    );

    let edges = sweep(active.len(), options, |j, out| {
        let later = active[j];
        for &earlier in &active[..j] {
            // Equal orders have no defined evaluation sequence.
            if earlier.order() >= later.order() {
                continue;
            }
            let kind = if earlier.covers(later) {
                ShadowKind::Full
            } else if earlier.overlaps(later) {
                ShadowKind::Partial
            } else {
                continue;
            };
            out.push(ShadowEdge {
                shadowed_id: later.id().to_string(),
                shadower_id: earlier.id().to_string(),
                kind,
                action_conflict: earlier.action() != later.action(),
            });
        }
    })?;

    Ok(ShadowReport { edges, skipped })
}
