//! Maps Finding API JSON payloads into [`ComparableRecord`]s.
//!
//! The upstream wraps nearly every field in a single-element array and omits fields freely,
//! so every lookup is optional. Items without an id or a usable current price are dropped.

use crate::domain::comparable::ComparableRecord;
use anyhow::bail;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use rust_decimal_macros::dec;
use std::str::FromStr;

/// Prices and shipping above this are treated as malformed. No real listing comes close, and
/// the bound keeps every later sum and ratio well inside `Decimal`'s range.
pub const MAX_LISTING_AMOUNT: Decimal = dec!(1000000000);

/// Extracts the records under `<response_key>[0].searchResult[0].item`.
///
/// A missing item list means zero results. An explicit `Failure` ack is an error so the
/// caller can log the upstream message.
pub fn records_from_response(
    payload: &Value,
    response_key: &str,
) -> anyhow::Result<Vec<ComparableRecord>> {
    let Some(response) = first(payload, response_key) else {
        bail!("payload has no {response_key} object");
    };

    if let Some(ack) = first_str(response, "ack") {
        if ack != "Success" && ack != "Warning" {
            let message = first(response, "errorMessage")
                .and_then(|m| first(m, "error"))
                .and_then(|e| first_str(e, "message"))
                .unwrap_or("no error message");
            bail!("upstream ack={ack}: {message}");
        }
    }

    let items = first(response, "searchResult")
        .and_then(|r| r.get("item"))
        .and_then(Value::as_array);

    let Some(items) = items else {
        return Ok(Vec::new());
    };

    let records: Vec<ComparableRecord> = items.iter().filter_map(record_from_item).collect();
    if records.len() < items.len() {
        tracing::debug!(
            response_key,
            total = items.len(),
            dropped = items.len() - records.len(),
            "dropped malformed marketplace items"
        );
    }
    Ok(records)
}

pub fn record_from_item(item: &Value) -> Option<ComparableRecord> {
    let listing_id = first_str(item, "itemId")?.trim().to_string();
    if listing_id.is_empty() {
        return None;
    }

    let price = first(item, "sellingStatus")
        .and_then(|s| first(s, "currentPrice"))
        .and_then(money_value)?;
    if !plausible_amount(price) {
        return None;
    }

    let shipping_cost = first(item, "shippingInfo")
        .and_then(|s| first(s, "shippingServiceCost"))
        .and_then(money_value)
        .filter(|c| *c >= Decimal::ZERO)
        .unwrap_or(Decimal::ZERO);
    if shipping_cost > MAX_LISTING_AMOUNT {
        return None;
    }

    let seller_rating = first(item, "sellerInfo")
        .and_then(|s| first_str(s, "feedbackScore"))
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let timestamp = first(item, "listingInfo")
        .and_then(|l| first_str(l, "endTime"))
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    Some(ComparableRecord {
        listing_id,
        title: first_str(item, "title").unwrap_or_default().trim().to_string(),
        price,
        shipping_cost,
        seller_rating,
        timestamp,
        source_url: first_str(item, "viewItemURL").unwrap_or_default().to_string(),
        image_url: first_str(item, "galleryURL").unwrap_or_default().to_string(),
    })
}

fn first<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    match v.get(key)? {
        Value::Array(values) => values.first(),
        other => Some(other),
    }
}

fn plausible_amount(amount: Decimal) -> bool {
    amount >= Decimal::ZERO && amount <= MAX_LISTING_AMOUNT
}

fn first_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    first(v, key)?.as_str()
}

// `{"@currencyId": "USD", "__value__": "12.5"}`; the value is usually a string.
fn money_value(v: &Value) -> Option<Decimal> {
    match v.get("__value__")? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}
