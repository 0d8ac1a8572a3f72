use crate::domain::comparable::ComparableRecord;
use crate::domain::error::QueryError;
use rust_decimal::Decimal;

pub mod ebay;
pub mod normalize;

/// Optional bounds on the asking price of active listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceRange {
    min: Option<Decimal>,
    max: Option<Decimal>,
}

impl PriceRange {
    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Result<Self, QueryError> {
        for (field, bound) in [("minPrice", min), ("maxPrice", max)] {
            if let Some(b) = bound {
                if b < Decimal::ZERO {
                    return Err(QueryError::invalid(field, format!("must be >= 0 (got {b})")));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(QueryError::invalid(
                    "minPrice",
                    format!("minPrice {lo} exceeds maxPrice {hi}"),
                ));
            }
        }
        Ok(Self { min, max })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn min(&self) -> Option<Decimal> {
        self.min
    }

    pub fn max(&self) -> Option<Decimal> {
        self.max
    }
}

/// Listing search against an external marketplace.
///
/// Implementations never fail towards the caller: network errors, throttling and malformed
/// payloads all come back as an empty sequence. Keywords are used verbatim.
#[async_trait::async_trait]
pub trait MarketplaceClient: Send + Sync {
    fn marketplace_name(&self) -> &'static str;

    async fn find_sold(&self, keywords: &str, category_hint: Option<&str>)
        -> Vec<ComparableRecord>;

    async fn find_active(&self, keywords: &str, price_range: PriceRange) -> Vec<ComparableRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_range_rejects_inverted_and_negative_bounds() {
        assert!(PriceRange::new(Some(dec!(10)), Some(dec!(100))).is_ok());
        assert!(PriceRange::new(Some(dec!(10)), None).is_ok());
        assert!(PriceRange::new(Some(dec!(100)), Some(dec!(10))).is_err());
        assert!(PriceRange::new(Some(dec!(-1)), None).is_err());
    }
}
