use crate::domain::error::QueryError;
use crate::domain::opportunity::ListingSummary;
use crate::engine::keywords::KeywordPolicy;
use crate::marketplace::{MarketplaceClient, PriceRange};

/// Active raw listings for one item, unscored, in upstream order.
pub async fn listings_for_item(
    marketplace: &dyn MarketplaceClient,
    keywords: &KeywordPolicy,
    item_name: &str,
) -> Result<Vec<ListingSummary>, QueryError> {
    let item_name = item_name.trim();
    if item_name.is_empty() {
        return Err(QueryError::invalid("cardName", "item name is required"));
    }

    let records = marketplace
        .find_active(&keywords.raw(item_name), PriceRange::unbounded())
        .await;
    Ok(records.into_iter().map(ListingSummary::from).collect())
}
