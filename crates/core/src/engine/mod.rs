use crate::domain::candidate::CandidateQuery;
use crate::domain::opportunity::FeeConfig;
use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::str::FromStr;

pub mod aggregate;
pub mod deal;
pub mod deal_score;
pub mod keywords;
pub mod listings;
pub mod opportunity;
pub mod profit;
pub mod rank;
pub mod refresh;

#[cfg(test)]
pub(crate) mod testing;

use keywords::KeywordPolicy;

const DEFAULT_PROFIT_THRESHOLD: Decimal = dec!(20);
const DEFAULT_OPPORTUNITY_MIN_SAMPLES: usize = 1;
const DEFAULT_DEAL_MIN_SAMPLES: usize = 3;
const DEFAULT_MAX_RESULTS: usize = 50;
const DEFAULT_PAIR_CONCURRENCY: usize = 4;

/// Policy shared by both pipelines. Everything here is a deployment tunable.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fees: FeeConfig,
    /// An opportunity must clear this strictly.
    pub profit_threshold: Decimal,
    pub opportunity_min_samples: usize,
    pub deal_min_samples: usize,
    pub max_results: usize,
    /// Pairs evaluated at once. Outbound requests are additionally spaced by the client.
    pub pair_concurrency: usize,
    pub category_hint: Option<String>,
    pub keywords: KeywordPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fees: FeeConfig::default(),
            profit_threshold: DEFAULT_PROFIT_THRESHOLD,
            opportunity_min_samples: DEFAULT_OPPORTUNITY_MIN_SAMPLES,
            deal_min_samples: DEFAULT_DEAL_MIN_SAMPLES,
            max_results: DEFAULT_MAX_RESULTS,
            pair_concurrency: DEFAULT_PAIR_CONCURRENCY,
            category_hint: None,
            keywords: KeywordPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        let flat_fee = decimal_var("FLAT_FEE")?.unwrap_or(out.fees.flat_fee());
        let percentage_fee = decimal_var("PERCENTAGE_FEE")?.unwrap_or(out.fees.percentage_fee());
        out.fees = FeeConfig::new(flat_fee, percentage_fee).context("invalid fee configuration")?;

        if let Some(threshold) = decimal_var("PROFIT_THRESHOLD")? {
            anyhow::ensure!(
                threshold >= Decimal::ZERO,
                "PROFIT_THRESHOLD must be >= 0 (got {threshold})"
            );
            out.profit_threshold = threshold;
        }

        if let Some(n) = usize_var("OPPORTUNITY_MIN_SAMPLES") {
            out.opportunity_min_samples = n.max(1);
        }
        if let Some(n) = usize_var("DEAL_MIN_SAMPLES") {
            out.deal_min_samples = n.max(1);
        }
        if let Some(n) = usize_var("MAX_RESULTS") {
            out.max_results = n;
        }
        if let Some(n) = usize_var("PAIR_CONCURRENCY") {
            out.pair_concurrency = n.max(1);
        }

        out.category_hint = std::env::var("MARKETPLACE_CATEGORY_ID")
            .ok()
            .filter(|s| !s.trim().is_empty());
        out.keywords = KeywordPolicy::from_env();

        Ok(out)
    }
}

fn decimal_var(key: &str) -> anyhow::Result<Option<Decimal>> {
    match std::env::var(key) {
        Ok(s) if !s.trim().is_empty() => Decimal::from_str(s.trim())
            .map(Some)
            .with_context(|| format!("{key} must be a decimal (got {s:?})")),
        _ => Ok(None),
    }
}

fn usize_var(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<usize>().ok())
}

/// Every (item, grade) pair of a candidate list, in list order.
///
/// Pairs are owned so the per-pair futures hold no borrow of the candidate list and stay
/// `Send` when a handler's future is spawned.
pub fn candidate_pairs(candidates: &[CandidateQuery]) -> Vec<(String, String)> {
    candidates
        .iter()
        .flat_map(|c| {
            c.target_grades
                .iter()
                .map(move |g| (c.item_name.clone(), g.clone()))
        })
        .collect()
}

/// What happened to one pair.
#[derive(Debug)]
pub enum PairOutcome<T> {
    /// A comp sample fell below its minimum; the pair produced nothing.
    Insufficient,
    Scored { kept: Vec<T>, rejected: usize },
}

/// Aggregate counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub pairs: usize,
    pub skipped_insufficient: usize,
    /// Candidates that had data but did not clear the filter.
    pub rejected: usize,
    pub materialized: usize,
}

#[derive(Debug)]
pub struct PipelineRun<T> {
    pub items: Vec<T>,
    pub stats: PipelineStats,
}

impl<T> PipelineRun<T> {
    pub fn collect(outcomes: Vec<PairOutcome<T>>) -> Self {
        let mut stats = PipelineStats {
            pairs: outcomes.len(),
            ..Default::default()
        };
        let mut items = Vec::new();
        for outcome in outcomes {
            match outcome {
                PairOutcome::Insufficient => stats.skipped_insufficient += 1,
                PairOutcome::Scored { kept, rejected } => {
                    stats.rejected += rejected;
                    stats.materialized += kept.len();
                    items.extend(kept);
                }
            }
        }
        Self { items, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_follow_candidate_then_grade_order() {
        let candidates = vec![
            CandidateQuery {
                item_name: "A".to_string(),
                target_grades: vec!["PSA 10".to_string(), "PSA 9".to_string()],
            },
            CandidateQuery {
                item_name: "B".to_string(),
                target_grades: vec!["BGS 9.5".to_string()],
            },
        ];
        let pairs = candidate_pairs(&candidates);
        let pairs: Vec<_> = pairs.iter().map(|(i, g)| (i.as_str(), g.as_str())).collect();
        assert_eq!(pairs, vec![("A", "PSA 10"), ("A", "PSA 9"), ("B", "BGS 9.5")]);
    }

    #[test]
    fn collect_counts_each_outcome() {
        let run = PipelineRun::collect(vec![
            PairOutcome::Insufficient,
            PairOutcome::Scored {
                kept: vec![1, 2],
                rejected: 3,
            },
            PairOutcome::Scored {
                kept: vec![],
                rejected: 1,
            },
        ]);
        assert_eq!(run.items, vec![1, 2]);
        assert_eq!(
            run.stats,
            PipelineStats {
                pairs: 3,
                skipped_insufficient: 1,
                rejected: 4,
                materialized: 2,
            }
        );
    }

    #[test]
    fn default_config_uses_stricter_deal_sample() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.opportunity_min_samples, 1);
        assert_eq!(cfg.deal_min_samples, 3);
        assert_eq!(cfg.max_results, 50);
    }
}
