use crate::domain::candidate::CandidateQuery;
use crate::domain::opportunity::Deal;
use crate::engine::aggregate::aggregate;
use crate::engine::deal_score::{classify, score};
use crate::engine::rank::rank;
use crate::engine::{candidate_pairs, EngineConfig, PairOutcome, PipelineRun};
use crate::marketplace::{MarketplaceClient, PriceRange};
use crate::storage::price_cache::PriceCache;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Active listings priced under the recent sold average for the same item and grade.
pub struct DealPipeline {
    marketplace: Arc<dyn MarketplaceClient>,
    config: Arc<EngineConfig>,
}

impl DealPipeline {
    pub fn new(marketplace: Arc<dyn MarketplaceClient>, config: Arc<EngineConfig>) -> Self {
        Self {
            marketplace,
            config,
        }
    }

    pub async fn run(
        &self,
        candidates: &[CandidateQuery],
        price_range: PriceRange,
    ) -> PipelineRun<Deal> {
        let pairs = candidate_pairs(candidates);
        let outcomes = stream::iter(pairs)
            .map(|(item_name, grade)| self.evaluate_pair(item_name, grade, price_range))
            .buffered(self.config.pair_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let run = PipelineRun::collect(outcomes);
        tracing::info!(
            marketplace = self.marketplace.marketplace_name(),
            pairs = run.stats.pairs,
            skipped_insufficient = run.stats.skipped_insufficient,
            not_below_reference = run.stats.rejected,
            materialized = run.stats.materialized,
            "deal pipeline finished"
        );
        run
    }

    /// [`Self::run`] followed by ranking on deal score.
    pub async fn run_ranked(
        &self,
        candidates: &[CandidateQuery],
        price_range: PriceRange,
        limit: usize,
    ) -> Vec<Deal> {
        let run = self.run(candidates, price_range).await;
        rank(run.items, |d| d.deal_score, limit)
    }

    async fn evaluate_pair(
        &self,
        item_name: String,
        grade: String,
        price_range: PriceRange,
    ) -> PairOutcome<Deal> {
        let (item_name, grade) = (item_name.as_str(), grade.as_str());
        let keywords = self.config.keywords.target(item_name, grade);
        let category = self.config.category_hint.as_deref();

        let sold = self.marketplace.find_sold(&keywords, category).await;

        let reference = aggregate(&sold, self.config.deal_min_samples);
        let Some(reference) = reference.stats() else {
            tracing::debug!(
                item_name,
                grade,
                samples = reference.sample_size(),
                min_samples = self.config.deal_min_samples,
                "insufficient sold comps for a reference price; skipping pair"
            );
            return PairOutcome::Insufficient;
        };
        let reference_price = reference.mean_price;

        // Active listings are only fetched once the pair has a usable reference price.
        let active = self.marketplace.find_active(&keywords, price_range).await;

        let mut kept = Vec::new();
        let mut rejected = 0;
        for listing in active {
            let Some(deal_score) = score(listing.price, Some(reference_price)) else {
                rejected += 1;
                continue;
            };
            if deal_score <= Decimal::ZERO {
                rejected += 1;
                continue;
            }

            kept.push(Deal {
                listing_id: listing.listing_id,
                title: listing.title,
                item_name: item_name.to_string(),
                grade: grade.to_string(),
                price: listing.price,
                reference_avg_price: reference_price,
                deal_score,
                tier: classify(deal_score),
                seller_rating: listing.seller_rating,
                shipping_cost: listing.shipping_cost,
                image_url: listing.image_url,
                listing_url: listing.source_url,
                sale_velocity: None,
            });
        }

        PairOutcome::Scored { kept, rejected }
    }
}

/// Copies the cached velocity label of each deal's (item, grade) pair onto the deal.
pub fn annotate_velocity(deals: &mut [Deal], cache: &PriceCache) {
    for deal in deals {
        deal.sale_velocity = cache
            .get(&deal.item_name, &deal.grade)
            .map(|entry| entry.sale_velocity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::opportunity::DealTier;
    use crate::engine::testing::{comp, FakeMarketplace};
    use rust_decimal_macros::dec;

    const PSA10: &str = "Acuna RC PSA 10";

    fn candidates() -> Vec<CandidateQuery> {
        vec![CandidateQuery {
            item_name: "Acuna RC".to_string(),
            target_grades: vec!["PSA 10".to_string()],
        }]
    }

    fn sold(prices: &[Decimal]) -> Vec<crate::domain::comparable::ComparableRecord> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| comp(&format!("s{i}"), *p, dec!(0)))
            .collect()
    }

    fn pipeline(market: FakeMarketplace) -> DealPipeline {
        DealPipeline::new(Arc::new(market), Arc::new(EngineConfig::default()))
    }

    #[tokio::test]
    async fn keeps_only_listings_below_reference() {
        let market = FakeMarketplace::default()
            .with_sold(PSA10, sold(&[dec!(300), dec!(310), dec!(320)]))
            .with_active(
                PSA10,
                vec![
                    comp("cheap", dec!(280), dec!(5)),
                    comp("at", dec!(310), dec!(0)),
                    comp("over", dec!(400), dec!(0)),
                    comp("steal", dec!(200), dec!(0)),
                ],
            );

        let run = pipeline(market).run(&candidates(), PriceRange::unbounded()).await;
        let ids: Vec<_> = run.items.iter().map(|d| d.listing_id.as_str()).collect();
        assert_eq!(ids, vec!["cheap", "steal"]);
        assert_eq!(run.stats.rejected, 2);

        let cheap = &run.items[0];
        assert_eq!(cheap.reference_avg_price, dec!(310));
        assert_eq!(cheap.deal_score.round_dp(4), dec!(0.0968));
        assert_eq!(cheap.tier, DealTier::Good);
        assert_eq!(cheap.shipping_cost, dec!(5));
        assert_eq!(cheap.listing_url, "https://listing/cheap");
        assert_eq!(run.items[1].tier, DealTier::Excellent);
    }

    #[tokio::test]
    async fn requires_minimum_reference_sample() {
        let market = Arc::new(
            FakeMarketplace::default()
                .with_sold(PSA10, sold(&[dec!(300), dec!(310)]))
                .with_active(PSA10, vec![comp("cheap", dec!(100), dec!(0))]),
        );

        let run = DealPipeline::new(market.clone(), Arc::new(EngineConfig::default()))
            .run(&candidates(), PriceRange::unbounded())
            .await;
        assert!(run.items.is_empty());
        assert_eq!(run.stats.skipped_insufficient, 1);
        // No active search is spent on a pair without a reference price.
        assert_eq!(market.call_count(), 1);
        assert!(market.ranges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_future_can_be_spawned() {
        let market = FakeMarketplace::default()
            .with_sold(PSA10, sold(&[dec!(100), dec!(100), dec!(100)]))
            .with_active(PSA10, vec![comp("a", dec!(80), dec!(0))]);
        let pipeline = pipeline(market);
        let candidates = candidates();

        let run = tokio::spawn(async move {
            pipeline.run(&candidates, PriceRange::unbounded()).await
        })
        .await
        .unwrap();
        assert_eq!(run.items.len(), 1);
        assert_eq!(run.items[0].listing_id, "a");
    }

    #[tokio::test]
    async fn passes_price_range_to_active_search() {
        let market = Arc::new(
            FakeMarketplace::default()
                .with_sold(PSA10, sold(&[dec!(300), dec!(300), dec!(300)]))
                .with_active(
                    PSA10,
                    vec![comp("a", dec!(50), dec!(0)), comp("b", dec!(150), dec!(0))],
                ),
        );
        let range = PriceRange::new(Some(dec!(100)), Some(dec!(200))).unwrap();

        let deals = DealPipeline::new(market.clone(), Arc::new(EngineConfig::default()))
            .run_ranked(&candidates(), range, 50)
            .await;

        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].listing_id, "b");
        assert_eq!(market.ranges.lock().unwrap().as_slice(), &[range]);
    }

    #[tokio::test]
    async fn ranks_by_score_and_truncates() {
        let market = FakeMarketplace::default()
            .with_sold(PSA10, sold(&[dec!(100), dec!(100), dec!(100)]))
            .with_active(
                PSA10,
                vec![
                    comp("a", dec!(90), dec!(0)),
                    comp("b", dec!(50), dec!(0)),
                    comp("c", dec!(70), dec!(0)),
                ],
            );

        let deals = pipeline(market)
            .run_ranked(&candidates(), PriceRange::unbounded(), 2)
            .await;
        let ids: Vec<_> = deals.iter().map(|d| d.listing_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn velocity_comes_from_cache_when_present() {
        use crate::domain::opportunity::SaleVelocity;
        use crate::storage::price_cache::PriceCacheEntry;

        let market = FakeMarketplace::default()
            .with_sold(PSA10, sold(&[dec!(100), dec!(100), dec!(100)]))
            .with_active(PSA10, vec![comp("a", dec!(90), dec!(0))]);
        let mut deals = pipeline(market)
            .run_ranked(&candidates(), PriceRange::unbounded(), 50)
            .await;

        annotate_velocity(&mut deals, &PriceCache::default());
        assert_eq!(deals[0].sale_velocity, None);

        let mut cache = PriceCache::default();
        cache.insert(
            "Acuna RC",
            "PSA 10",
            PriceCacheEntry {
                reference_price: dec!(100),
                sample_size: 3,
                last_updated: chrono::Utc::now(),
                sale_velocity: SaleVelocity::Quick,
            },
        );
        annotate_velocity(&mut deals, &cache);
        assert_eq!(deals[0].sale_velocity, Some(SaleVelocity::Quick));
    }
}
