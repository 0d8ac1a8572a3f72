use crate::domain::candidate::CandidateQuery;
use crate::domain::comparable::ComparableRecord;
use crate::domain::opportunity::Opportunity;
use crate::engine::aggregate::aggregate;
use crate::engine::profit::potential_profit;
use crate::engine::rank::rank;
use crate::engine::{candidate_pairs, EngineConfig, PairOutcome, PipelineRun};
use crate::marketplace::MarketplaceClient;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Raw-versus-graded profit search over a candidate list.
pub struct OpportunityPipeline {
    marketplace: Arc<dyn MarketplaceClient>,
    config: Arc<EngineConfig>,
}

impl OpportunityPipeline {
    pub fn new(marketplace: Arc<dyn MarketplaceClient>, config: Arc<EngineConfig>) -> Self {
        Self {
            marketplace,
            config,
        }
    }

    /// Materialized opportunities in candidate order, plus run counters.
    pub async fn run(&self, candidates: &[CandidateQuery]) -> PipelineRun<Opportunity> {
        let pairs = candidate_pairs(candidates);
        let outcomes = stream::iter(pairs)
            .map(|(item_name, grade)| self.evaluate_pair(item_name, grade))
            .buffered(self.config.pair_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let run = PipelineRun::collect(outcomes);
        tracing::info!(
            marketplace = self.marketplace.marketplace_name(),
            pairs = run.stats.pairs,
            skipped_insufficient = run.stats.skipped_insufficient,
            below_threshold = run.stats.rejected,
            materialized = run.stats.materialized,
            "opportunity pipeline finished"
        );
        run
    }

    /// [`Self::run`] followed by ranking on potential profit.
    pub async fn run_ranked(&self, candidates: &[CandidateQuery], limit: usize) -> Vec<Opportunity> {
        let run = self.run(candidates).await;
        rank(run.items, |o| o.potential_profit, limit)
    }

    async fn evaluate_pair(&self, item_name: String, grade: String) -> PairOutcome<Opportunity> {
        let (item_name, grade) = (item_name.as_str(), grade.as_str());
        let raw_keywords = self.config.keywords.raw(item_name);
        let target_keywords = self.config.keywords.target(item_name, grade);
        let category = self.config.category_hint.as_deref();

        let (raw_comps, target_comps) = tokio::join!(
            self.marketplace.find_sold(&raw_keywords, category),
            self.marketplace.find_sold(&target_keywords, category),
        );

        let min = self.config.opportunity_min_samples;
        let raw = aggregate(&raw_comps, min);
        let target = aggregate(&target_comps, min);
        let (Some(raw), Some(target)) = (raw.stats(), target.stats()) else {
            tracing::debug!(
                item_name,
                grade,
                raw_samples = raw.sample_size(),
                target_samples = target.sample_size(),
                min_samples = min,
                "insufficient comps; skipping pair"
            );
            return PairOutcome::Insufficient;
        };

        let profit = potential_profit(raw.mean_total_cost, target.mean_price, &self.config.fees);
        if profit <= self.config.profit_threshold {
            tracing::debug!(item_name, grade, %profit, "below profit threshold");
            return PairOutcome::Scored {
                kept: Vec::new(),
                rejected: 1,
            };
        }

        PairOutcome::Scored {
            kept: vec![Opportunity {
                item_name: item_name.to_string(),
                grade: grade.to_string(),
                avg_raw_cost: raw.mean_total_cost,
                avg_target_price: target.mean_price,
                potential_profit: profit,
                image_url: pick_image(&raw_comps, &target_comps),
            }],
            rejected: 0,
        }
    }
}

// Prefer a raw listing photo since that is what gets bought.
fn pick_image(raw: &[ComparableRecord], target: &[ComparableRecord]) -> String {
    raw.iter()
        .chain(target.iter())
        .find(|r| r.has_image())
        .map(|r| r.image_url.clone())
        .unwrap_or_default()
}
