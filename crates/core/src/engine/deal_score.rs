use crate::domain::opportunity::DealTier;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const EXCELLENT_ABOVE: Decimal = dec!(0.15);
const GOOD_ABOVE: Decimal = dec!(0.05);

/// `(reference - price) / reference`, or `None` when there is no usable reference or the
/// ratio does not fit a `Decimal`.
pub fn score(price: Decimal, reference_avg_price: Option<Decimal>) -> Option<Decimal> {
    let reference = reference_avg_price.filter(|r| !r.is_zero())?;
    reference.checked_sub(price)?.checked_div(reference)
}

pub fn classify(score: Decimal) -> DealTier {
    if score > EXCELLENT_ABOVE {
        DealTier::Excellent
    } else if score > GOOD_ABOVE {
        DealTier::Good
    } else {
        DealTier::Fair
    }
}
