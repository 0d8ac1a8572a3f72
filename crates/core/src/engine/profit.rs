use crate::domain::opportunity::FeeConfig;
use rust_decimal::Decimal;

/// Net gain from buying raw at `avg_raw_cost` and reselling graded at `avg_target_price`.
///
/// Negative results are valid; they simply never clear the opportunity threshold.
pub fn potential_profit(avg_raw_cost: Decimal, avg_target_price: Decimal, fees: &FeeConfig) -> Decimal {
    avg_target_price - avg_raw_cost - fees.flat_fee() - avg_target_price * fees.percentage_fee()
}
