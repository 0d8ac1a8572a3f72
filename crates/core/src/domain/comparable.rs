use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One matched upstream listing, sold or active, normalized into a fixed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableRecord {
    pub listing_id: String,
    pub title: String,
    pub price: Decimal,
    pub shipping_cost: Decimal,
    pub seller_rating: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub source_url: String,
    pub image_url: String,
}

impl ComparableRecord {
    /// Price plus shipping; `None` if the sum does not fit a `Decimal`.
    pub fn total_cost(&self) -> Option<Decimal> {
        self.price.checked_add(self.shipping_cost)
    }

    pub fn has_image(&self) -> bool {
        !self.image_url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub sample_size: usize,
    pub mean_price: Decimal,
    pub mean_total_cost: Decimal,
}

/// Result of aggregating a comp sample. `Insufficient` must never be read as a zero price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sufficient(AggregateStats),
    Insufficient { sample_size: usize },
}

impl Aggregate {
    pub fn stats(&self) -> Option<&AggregateStats> {
        match self {
            Aggregate::Sufficient(stats) => Some(stats),
            Aggregate::Insufficient { .. } => None,
        }
    }

    pub fn sample_size(&self) -> usize {
        match self {
            Aggregate::Sufficient(stats) => stats.sample_size,
            Aggregate::Insufficient { sample_size } => *sample_size,
        }
    }
}
