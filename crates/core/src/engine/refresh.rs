use crate::advisory::{
    classify_velocity_isolated, AdvisoryClient, VelocityInput, VELOCITY_HISTORY_LEN,
};
use crate::domain::candidate::CandidateQuery;
use crate::engine::aggregate::aggregate;
use crate::engine::{candidate_pairs, EngineConfig};
use crate::marketplace::MarketplaceClient;
use crate::storage::price_cache::{PriceCache, PriceCacheEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub pairs: usize,
    pub refreshed: usize,
    /// Pairs with no sold comps; any previous entry is left as it was.
    pub skipped: usize,
}

/// Recomputes the reference price of every hotlist pair from its sold comps.
///
/// Pairs are walked one at a time; the marketplace client spaces the requests.
pub async fn refresh_reference_prices(
    marketplace: &dyn MarketplaceClient,
    advisory: Option<&dyn AdvisoryClient>,
    config: &EngineConfig,
    candidates: &[CandidateQuery],
    cache: &mut PriceCache,
    now: DateTime<Utc>,
) -> RefreshSummary {
    let pairs = candidate_pairs(candidates);
    let mut summary = RefreshSummary {
        pairs: pairs.len(),
        ..Default::default()
    };

    for (item_name, grade) in pairs.iter().map(|(i, g)| (i.as_str(), g.as_str())) {
        let keywords = config.keywords.target(item_name, grade);
        let sold = marketplace
            .find_sold(&keywords, config.category_hint.as_deref())
            .await;

        let sample = aggregate(&sold, config.deal_min_samples);
        let Some(stats) = sample.stats().copied() else {
            tracing::info!(
                item_name,
                grade,
                samples = sample.sample_size(),
                min_samples = config.deal_min_samples,
                "too few sold comps; keeping previous reference price"
            );
            summary.skipped += 1;
            continue;
        };

        let velocity = classify_velocity_isolated(
            advisory,
            &VelocityInput {
                item_name: item_name.to_string(),
                grade: grade.to_string(),
                recent_sales: stats.sample_size.min(VELOCITY_HISTORY_LEN),
            },
        )
        .await;

        tracing::info!(
            item_name,
            grade,
            reference_price = %stats.mean_price,
            samples = stats.sample_size,
            %velocity,
            "reference price refreshed"
        );
        cache.insert(
            item_name,
            grade,
            PriceCacheEntry {
                reference_price: stats.mean_price,
                sample_size: stats.sample_size,
                last_updated: now,
                sale_velocity: velocity,
            },
        );
        summary.refreshed += 1;
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::opportunity::SaleVelocity;
    use crate::engine::testing::{comp, FakeMarketplace};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn refreshes_pairs_with_comps_and_keeps_others() {
        let market = FakeMarketplace::default().with_sold(
            "Acuna PSA 10",
            vec![
                comp("a", dec!(300), dec!(4)),
                comp("b", dec!(320), dec!(0)),
                comp("c", dec!(310), dec!(0)),
            ],
        );
        let old = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 27, 0, 0, 0).unwrap();

        let mut cache = PriceCache::default();
        cache.insert(
            "Acuna",
            "PSA 9",
            PriceCacheEntry {
                reference_price: dec!(90),
                sample_size: 5,
                last_updated: old,
                sale_velocity: SaleVelocity::Medium,
            },
        );

        let candidates = vec![CandidateQuery {
            item_name: "Acuna".to_string(),
            target_grades: vec!["PSA 10".to_string(), "PSA 9".to_string()],
        }];
        let summary = refresh_reference_prices(
            &market,
            None,
            &EngineConfig::default(),
            &candidates,
            &mut cache,
            now,
        )
        .await;

        assert_eq!(
            summary,
            RefreshSummary {
                pairs: 2,
                refreshed: 1,
                skipped: 1,
            }
        );
        let fresh = cache.get("Acuna", "PSA 10").unwrap();
        assert_eq!(fresh.reference_price, dec!(310));
        assert_eq!(fresh.sample_size, 3);
        assert_eq!(fresh.last_updated, now);
        assert_eq!(fresh.sale_velocity, SaleVelocity::Slow);

        let kept = cache.get("Acuna", "PSA 9").unwrap();
        assert_eq!(kept.reference_price, dec!(90));
        assert_eq!(kept.last_updated, old);
    }

    fn acuna_psa10() -> Vec<CandidateQuery> {
        vec![CandidateQuery {
            item_name: "Acuna".to_string(),
            target_grades: vec!["PSA 10".to_string()],
        }]
    }

    #[tokio::test]
    async fn thin_sold_history_does_not_set_a_price() {
        let market = FakeMarketplace::default().with_sold(
            "Acuna PSA 10",
            vec![comp("a", dec!(300), dec!(0)), comp("b", dec!(320), dec!(0))],
        );
        let mut cache = PriceCache::default();

        let summary = refresh_reference_prices(
            &market,
            None,
            &EngineConfig::default(),
            &acuna_psa10(),
            &mut cache,
            Utc::now(),
        )
        .await;
        assert_eq!(summary.skipped, 1);
        assert!(cache.is_empty());

        let lenient = EngineConfig {
            deal_min_samples: 2,
            ..EngineConfig::default()
        };
        let summary =
            refresh_reference_prices(&market, None, &lenient, &acuna_psa10(), &mut cache, Utc::now())
                .await;
        assert_eq!(summary.refreshed, 1);
        assert_eq!(cache.get("Acuna", "PSA 10").unwrap().reference_price, dec!(310));
    }

    #[derive(Default)]
    struct RecordingAdvisor {
        seen: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl AdvisoryClient for RecordingAdvisor {
        fn provider(&self) -> crate::advisory::Provider {
            crate::advisory::Provider::Anthropic
        }

        async fn analyze_title(&self, _title: &str) -> anyhow::Result<String> {
            anyhow::bail!("not used")
        }

        async fn classify_velocity(&self, input: &VelocityInput) -> anyhow::Result<SaleVelocity> {
            self.seen.lock().unwrap().push(input.recent_sales);
            Ok(SaleVelocity::Quick)
        }
    }

    #[tokio::test]
    async fn velocity_counts_only_recent_history() {
        let sold: Vec<_> = (0..25)
            .map(|i| comp(&format!("s{i}"), dec!(100), dec!(0)))
            .collect();
        let market = FakeMarketplace::default().with_sold("Acuna PSA 10", sold);
        let advisor = RecordingAdvisor::default();
        let mut cache = PriceCache::default();

        refresh_reference_prices(
            &market,
            Some(&advisor),
            &EngineConfig::default(),
            &acuna_psa10(),
            &mut cache,
            Utc::now(),
        )
        .await;

        assert_eq!(advisor.seen.lock().unwrap().as_slice(), &[VELOCITY_HISTORY_LEN]);
        let entry = cache.get("Acuna", "PSA 10").unwrap();
        assert_eq!(entry.sample_size, 25);
        assert_eq!(entry.sale_velocity, SaleVelocity::Quick);
    }
}
