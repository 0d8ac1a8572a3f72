//! Test doubles shared by the engine tests.

use crate::domain::comparable::ComparableRecord;
use crate::marketplace::{MarketplaceClient, PriceRange};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

pub fn comp(id: &str, price: Decimal, shipping: Decimal) -> ComparableRecord {
    ComparableRecord {
        listing_id: id.to_string(),
        title: format!("Listing {id}"),
        price,
        shipping_cost: shipping,
        seller_rating: 100,
        timestamp: None,
        source_url: format!("https://listing/{id}"),
        image_url: format!("https://img/{id}.jpg"),
    }
}

/// Canned results keyed by the exact keyword string. Unknown keywords return nothing, the
/// same way an unreachable upstream does.
#[derive(Debug, Default)]
pub struct FakeMarketplace {
    sold: HashMap<String, Vec<ComparableRecord>>,
    active: HashMap<String, Vec<ComparableRecord>>,
    pub calls: Mutex<Vec<(String, String)>>,
    pub ranges: Mutex<Vec<PriceRange>>,
}

impl FakeMarketplace {
    pub fn with_sold(mut self, keywords: &str, records: Vec<ComparableRecord>) -> Self {
        self.sold.insert(keywords.to_string(), records);
        self
    }

    pub fn with_active(mut self, keywords: &str, records: Vec<ComparableRecord>) -> Self {
        self.active.insert(keywords.to_string(), records);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl MarketplaceClient for FakeMarketplace {
    fn marketplace_name(&self) -> &'static str {
        "fake"
    }

    async fn find_sold(&self, keywords: &str, _category_hint: Option<&str>) -> Vec<ComparableRecord> {
        self.calls
            .lock()
            .unwrap()
            .push(("sold".to_string(), keywords.to_string()));
        self.sold.get(keywords).cloned().unwrap_or_default()
    }

    async fn find_active(&self, keywords: &str, price_range: PriceRange) -> Vec<ComparableRecord> {
        self.calls
            .lock()
            .unwrap()
            .push(("active".to_string(), keywords.to_string()));
        self.ranges.lock().unwrap().push(price_range);
        self.active
            .get(keywords)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| price_range.min().map_or(true, |min| r.price >= min))
                    .filter(|r| price_range.max().map_or(true, |max| r.price <= max))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
