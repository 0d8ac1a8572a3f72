use crate::domain::comparable::{Aggregate, AggregateStats, ComparableRecord};
use rust_decimal::Decimal;

/// Count, mean price and mean total cost of a comp sample.
///
/// Returns [`Aggregate::Insufficient`] when `records.len() < min_samples`. A `min_samples` of
/// zero is treated as one so an empty sample is never averaged. A sample whose sums overflow
/// `Decimal` is also reported as insufficient rather than averaged.
pub fn aggregate(records: &[ComparableRecord], min_samples: usize) -> Aggregate {
    let sample_size = records.len();
    if sample_size < min_samples.max(1) {
        return Aggregate::Insufficient { sample_size };
    }

    let Some((price_sum, total_sum)) = checked_sums(records) else {
        tracing::warn!(sample_size, "comp prices overflow when summed; treating sample as unusable");
        return Aggregate::Insufficient { sample_size };
    };

    let n = Decimal::from(sample_size);
    Aggregate::Sufficient(AggregateStats {
        sample_size,
        mean_price: price_sum / n,
        mean_total_cost: total_sum / n,
    })
}

fn checked_sums(records: &[ComparableRecord]) -> Option<(Decimal, Decimal)> {
    records
        .iter()
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(prices, totals), r| {
            Some((prices.checked_add(r.price)?, totals.checked_add(r.total_cost()?)?))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::comp;
    use rust_decimal_macros::dec;

    #[test]
    fn means_include_shipping_only_in_total_cost() {
        let records = vec![comp("a", dec!(100), dec!(10)), comp("b", dec!(120), dec!(0))];
        let stats = *aggregate(&records, 1).stats().unwrap();
        assert_eq!(stats.sample_size, 2);
        assert_eq!(stats.mean_price, dec!(110));
        assert_eq!(stats.mean_total_cost, dec!(115));
    }

    #[test]
    fn zero_shipping_makes_total_cost_equal_price() {
        let records = vec![
            comp("a", dec!(19.99), dec!(0)),
            comp("b", dec!(42.50), dec!(0)),
            comp("c", dec!(7), dec!(0)),
        ];
        let stats = *aggregate(&records, 1).stats().unwrap();
        assert_eq!(stats.mean_total_cost, stats.mean_price);
    }

    #[test]
    fn insufficient_iff_below_min_samples() {
        let records: Vec<_> = (0..3)
            .map(|i| comp(&i.to_string(), dec!(10), dec!(1)))
            .collect();
        for min in 1..=5 {
            for n in 0..=records.len() {
                let agg = aggregate(&records[..n], min);
                assert_eq!(
                    matches!(agg, Aggregate::Insufficient { .. }),
                    n < min,
                    "n={n} min={min}"
                );
                assert_eq!(agg.sample_size(), n);
            }
        }
    }

    #[test]
    fn overflowing_sums_do_not_panic() {
        let records = vec![
            comp("a", Decimal::MAX, dec!(0)),
            comp("b", Decimal::MAX, dec!(0)),
        ];
        assert_eq!(aggregate(&records, 1), Aggregate::Insufficient { sample_size: 2 });

        let single = vec![comp("a", Decimal::MAX, dec!(1))];
        assert_eq!(aggregate(&single, 1), Aggregate::Insufficient { sample_size: 1 });
    }

    #[test]
    fn empty_sample_is_insufficient_even_with_zero_minimum() {
        assert_eq!(aggregate(&[], 0), Aggregate::Insufficient { sample_size: 0 });
    }
}
