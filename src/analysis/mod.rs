//! Rule-set analyzers.
//!
//! The redundancy and shadow analyzers are pairwise sweeps over an
//! immutable rule list. Both split the outer rule index into batches and run
//! the batches on rayon; each batch fills its own buffer and the buffers are
//! concatenated in batch order afterwards.

mod cancel;
mod filter;
mod redundancy;
mod shadow;

pub use cancel::CancelToken;
pub use filter::{filter, filter_ids, FilterCriteria, FilterSummary, MatchMode};
pub use redundancy::{analyze_redundancy, RedundancyEdge, RedundancyGroup, RedundancyReport};
pub use shadow::{analyze_shadowing, ShadowEdge, ShadowKind, ShadowReport, ShadowSummary, ShadowerCount};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::{AnalysisConfig, DEFAULT_BATCH_SIZE};
use crate::rule::Rule;
use crate::Result;

/// Batching and cancellation for one sweep.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub batch_size: usize,
    pub cancel: CancelToken,
}

impl SweepOptions {
    pub fn new(batch_size: usize, cancel: CancelToken) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cancel,
        }
    }
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, CancelToken::new())
    }
}

/// Why a rule took no part in an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
}

/// A rule excluded from an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SkippedRule {
    pub rule_id: String,
    pub reason: SkipReason,
}

/// Split rules into the enabled ones and skip records for the rest.
pub(crate) fn partition_enabled(rules: &[Rule]) -> (Vec<&Rule>, Vec<SkippedRule>) {
    let mut active = Vec::with_capacity(rules.len());
    let mut skipped = Vec::new();
    for rule in rules {
        if rule.is_enabled() {
            active.push(rule);
        } else {
            skipped.push(SkippedRule {
                rule_id: rule.id().to_string(),
                reason: SkipReason::Disabled,
            });
        }
    }
    (active, skipped)
}

/// Run `visit` for every outer index in `0..len`, batched across rayon.
///
/// Output keeps outer-index order. Returns [`crate::Error::Cancelled`] if the
/// token fires before every batch has started.
pub(crate) fn sweep<E, F>(len: usize, options: &SweepOptions, visit: F) -> Result<Vec<E>>
where
    E: Send,
    F: Fn(usize, &mut Vec<E>) + Sync,
{
    let indices: Vec<usize> = (0..len).collect();
    let batches = indices
        .par_chunks(options.batch_size.max(1))
        .map(|batch| -> Result<Vec<E>> {
            options.cancel.check()?;
            let mut out = Vec::new();
            for &i in batch {
                visit(i, &mut out);
            }
            log::debug!(
                "Batch {}..={} done, {} findings",
                batch[0],
                batch[batch.len() - 1],
                out.len()
            );
            Ok(out)
        })
        .collect::<Result<Vec<Vec<E>>>>();

    match batches {
        Ok(batches) => Ok(batches.into_iter().flatten().collect()),
        Err(e) => {
            log::warn!("Analysis cancelled");
            Err(e)
        }
    }
}

/// Combined output of a full analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub redundancy: Vec<RedundancyEdge>,
    pub shadow: Vec<ShadowEdge>,
    pub skipped: Vec<SkippedRule>,
}

/// Runs the analyzers under one configuration and cancellation token.
#[derive(Debug)]
pub struct PolicyAnalyzer {
    config: AnalysisConfig,
    cancel: CancelToken,
    pool: Option<rayon::ThreadPool>,
}

impl PolicyAnalyzer {
    /// Create an analyzer, building a dedicated pool if `threads` is set.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("fwaudit-{}", i))
                    .build()?,
            ),
            None => None,
        };
        Ok(Self {
            config,
            cancel: CancelToken::new(),
            pool,
        })
    }

    /// Replace the cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Token observed by every run of this analyzer.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn options(&self) -> SweepOptions {
        SweepOptions::new(self.config.batch_size, self.cancel.clone())
    }

    fn install<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    pub fn redundancy(&self, rules: &[Rule]) -> Result<RedundancyReport> {
        let options = self.options();
        self.install(|| analyze_redundancy(rules, &options))
    }

    pub fn shadowing(&self, rules: &[Rule]) -> Result<ShadowReport> {
        let options = self.options();
        self.install(|| analyze_shadowing(rules, &options))
    }

    /// Run both analyzers.
    pub fn analyze(&self, rules: &[Rule]) -> Result<AnalysisReport> {
        log::info!("Analyzing {} rules", rules.len());
        let redundancy = self.redundancy(rules)?;
        let shadow = self.shadowing(rules)?;
        log::info!(
            "Found {} redundancy edges, {} shadow edges",
            redundancy.edges.len(),
            shadow.edges.len()
        );
        Ok(AnalysisReport {
            redundancy: redundancy.edges,
            shadow: shadow.edges,
            skipped: redundancy.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_sweep_keeps_order() {
        let options = SweepOptions::new(3, CancelToken::new());
        let out = sweep(10, &options, |i, out| {
            if i % 2 == 0 {
                out.push(i)
            }
        })
        .unwrap();
        assert_eq!(out, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_sweep_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = SweepOptions::new(1, cancel);
        let result = sweep(4, &options, |i, out: &mut Vec<usize>| out.push(i));
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_sweep_empty() {
        let out: Vec<usize> = sweep(0, &SweepOptions::default(), |i, out| out.push(i)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_analyzer_rejects_bad_config() {
        let config = AnalysisConfig::default().with_batch_size(0);
        assert!(matches!(PolicyAnalyzer::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_dedicated_pool() {
        let analyzer = PolicyAnalyzer::new(AnalysisConfig::default().with_threads(2)).unwrap();
        let report = analyzer.analyze(&[]).unwrap();
        assert!(report.redundancy.is_empty());
        assert!(report.shadow.is_empty());
    }
}
