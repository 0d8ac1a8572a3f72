use crate::domain::comparable::ComparableRecord;
use anyhow::ensure;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction costs charged between buying raw and reselling graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    flat_fee: Decimal,
    percentage_fee: Decimal,
}

// Grading submission plus marketplace final-value fee.
impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            flat_fee: dec!(30),
            percentage_fee: dec!(0.13),
        }
    }
}

impl FeeConfig {
    /// `flat_fee >= 0`, `percentage_fee` in `[0, 1)`.
    pub fn new(flat_fee: Decimal, percentage_fee: Decimal) -> anyhow::Result<Self> {
        ensure!(
            flat_fee >= Decimal::ZERO,
            "flat fee must be >= 0 (got {flat_fee})"
        );
        ensure!(
            percentage_fee >= Decimal::ZERO && percentage_fee < Decimal::ONE,
            "percentage fee must be in [0, 1) (got {percentage_fee})"
        );
        Ok(Self {
            flat_fee,
            percentage_fee,
        })
    }

    pub fn flat_fee(&self) -> Decimal {
        self.flat_fee
    }

    pub fn percentage_fee(&self) -> Decimal {
        self.percentage_fee
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(rename = "cardName")]
    pub item_name: String,
    pub grade: String,
    #[serde(rename = "avgRawPrice")]
    pub avg_raw_cost: Decimal,
    #[serde(rename = "avgPsaPrice")]
    pub avg_target_price: Decimal,
    #[serde(rename = "potentialProfit")]
    pub potential_profit: Decimal,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealTier {
    Excellent,
    Good,
    Fair,
}

/// Qualitative sale frequency attached by the advisory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleVelocity {
    Quick,
    Medium,
    Slow,
}

impl SaleVelocity {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleVelocity::Quick => "Quick",
            SaleVelocity::Medium => "Medium",
            SaleVelocity::Slow => "Slow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Quick" => Some(SaleVelocity::Quick),
            "Medium" => Some(SaleVelocity::Medium),
            "Slow" => Some(SaleVelocity::Slow),
            _ => None,
        }
    }
}

impl fmt::Display for SaleVelocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    #[serde(rename = "id")]
    pub listing_id: String,
    pub title: String,
    #[serde(rename = "cardName")]
    pub item_name: String,
    pub grade: String,
    pub price: Decimal,
    #[serde(rename = "avgSalePrice")]
    pub reference_avg_price: Decimal,
    pub deal_score: Decimal,
    #[serde(rename = "dealTier")]
    pub tier: DealTier,
    pub seller_rating: u64,
    #[serde(rename = "shippingPrice")]
    pub shipping_cost: Decimal,
    pub image_url: String,
    pub listing_url: String,
    #[serde(
        rename = "saleProbability",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sale_velocity: Option<SaleVelocity>,
}

/// Active listing returned without scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub image_url: String,
    pub listing_url: String,
    pub seller_rating: u64,
    pub shipping_price: Decimal,
}

impl From<ComparableRecord> for ListingSummary {
    fn from(record: ComparableRecord) -> Self {
        Self {
            id: record.listing_id,
            title: record.title,
            price: record.price,
            image_url: record.image_url,
            listing_url: record.source_url,
            seller_rating: record.seller_rating,
            shipping_price: record.shipping_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_config_bounds() {
        assert!(FeeConfig::new(dec!(30), dec!(0.13)).is_ok());
        assert!(FeeConfig::new(dec!(0), dec!(0)).is_ok());
        assert!(FeeConfig::new(dec!(-1), dec!(0.13)).is_err());
        assert!(FeeConfig::new(dec!(30), dec!(1)).is_err());
        assert!(FeeConfig::new(dec!(30), dec!(-0.01)).is_err());
    }

    #[test]
    fn opportunity_serializes_with_api_field_names() {
        let opp = Opportunity {
            item_name: "Card".to_string(),
            grade: "PSA 10".to_string(),
            avg_raw_cost: dec!(115),
            avg_target_price: dec!(310),
            potential_profit: dec!(124.7),
            image_url: "https://img/1.jpg".to_string(),
        };
        let v = serde_json::to_value(&opp).unwrap();
        assert_eq!(v["cardName"], "Card");
        assert_eq!(v["avgRawPrice"].as_f64(), Some(115.0));
        assert_eq!(v["avgPsaPrice"].as_f64(), Some(310.0));
        let profit = v["potentialProfit"].as_f64().unwrap();
        assert!((profit - 124.7).abs() < 1e-9);
        assert_eq!(v["imageUrl"], "https://img/1.jpg");
    }

    #[test]
    fn velocity_parse_is_exact() {
        assert_eq!(SaleVelocity::parse("Quick"), Some(SaleVelocity::Quick));
        assert_eq!(SaleVelocity::parse("quick"), None);
        assert_eq!(SaleVelocity::parse("Slow."), None);
    }
}
