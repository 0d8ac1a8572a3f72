use crate::config::Settings;
use crate::domain::comparable::ComparableRecord;
use crate::marketplace::normalize;
use crate::marketplace::{MarketplaceClient, PriceRange};
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://svcs.ebay.com/services/search/FindingService/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const MAX_RETRIES: u32 = 10;
const MAX_BACKOFF: Duration = Duration::from_secs(8);
const DEFAULT_REQ_DELAY_MS: u64 = 250;
const DEFAULT_ENTRIES_PER_PAGE: u32 = 50;

const OP_FIND_COMPLETED: &str = "findCompletedItems";
const OP_FIND_BY_KEYWORDS: &str = "findItemsByKeywords";

/// Finding API client. One instance owns the outbound request budget: every request waits
/// until `req_delay` has passed since the previous one, across all concurrent callers.
#[derive(Debug)]
pub struct EbayFindingClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    retries: u32,
    req_delay: Duration,
    entries_per_page: u32,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl EbayFindingClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let app_id = settings.require_marketplace_app_id()?.to_string();
        let base_url = settings
            .marketplace_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("MARKETPLACE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKETPLACE_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_RETRIES)
            .min(MAX_RETRIES);

        let req_delay_ms = std::env::var("MARKETPLACE_REQ_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQ_DELAY_MS);

        let entries_per_page = std::env::var("MARKETPLACE_ENTRIES_PER_PAGE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| (1..=100).contains(n))
            .unwrap_or(DEFAULT_ENTRIES_PER_PAGE);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build marketplace http client")?;

        Ok(Self {
            http,
            base_url,
            app_id,
            retries,
            req_delay: Duration::from_millis(req_delay_ms),
            entries_per_page,
            last_request: tokio::sync::Mutex::new(None),
        })
    }

    fn base_params(&self, operation: &str, keywords: &str) -> Vec<(String, String)> {
        vec![
            ("SECURITY-APPNAME".to_string(), self.app_id.clone()),
            ("OPERATION-NAME".to_string(), operation.to_string()),
            ("SERVICE-VERSION".to_string(), "1.13.0".to_string()),
            ("RESPONSE-DATA-FORMAT".to_string(), "JSON".to_string()),
            ("REST-PAYLOAD".to_string(), String::new()),
            ("keywords".to_string(), keywords.to_string()),
            (
                "paginationInput.entriesPerPage".to_string(),
                self.entries_per_page.to_string(),
            ),
        ]
    }

    fn sold_params(&self, keywords: &str, category_hint: Option<&str>) -> Vec<(String, String)> {
        let mut params = self.base_params(OP_FIND_COMPLETED, keywords);
        let mut filters = ItemFilters::default();
        filters.push("SoldItemsOnly", "true", None);
        filters.append_to(&mut params);
        params.push(("sortOrder".to_string(), "EndTimeSoonest".to_string()));
        if let Some(category) = category_hint.map(str::trim).filter(|c| !c.is_empty()) {
            params.push(("categoryId".to_string(), category.to_string()));
        }
        params
    }

    fn active_params(&self, keywords: &str, price_range: PriceRange) -> Vec<(String, String)> {
        let mut params = self.base_params(OP_FIND_BY_KEYWORDS, keywords);
        let mut filters = ItemFilters::default();
        filters.push("ListingType", "FixedPrice", None);
        if let Some(min) = price_range.min() {
            filters.push("MinPrice", &min.to_string(), Some(("Currency", "USD")));
        }
        if let Some(max) = price_range.max() {
            filters.push("MaxPrice", &max.to_string(), Some(("Currency", "USD")));
        }
        filters.append_to(&mut params);
        params
    }

    async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.req_delay {
                tokio::time::sleep(self.req_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_once(&self, params: &[(String, String)]) -> Result<Value> {
        self.wait_turn().await;

        let res = self
            .http
            .get(&self.base_url)
            .query(params)
            .send()
            .await
            .context("marketplace request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read marketplace response")?;

        if !status.is_success() {
            anyhow::bail!("marketplace HTTP {status}: {text}");
        }

        serde_json::from_str::<Value>(&text).context("marketplace response is not valid JSON")
    }

    async fn search(
        &self,
        operation: &'static str,
        params: Vec<(String, String)>,
    ) -> Result<Vec<ComparableRecord>> {
        let response_key = format!("{operation}Response");
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let res = self
                .fetch_once(&params)
                .await
                .and_then(|payload| normalize::records_from_response(&payload, &response_key));
            match res {
                Ok(records) => return Ok(records),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = backoff_after(attempt);
                    tracing::warn!(attempt, operation, ?backoff, error = %err, "marketplace search failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn search_or_empty(
        &self,
        operation: &'static str,
        keywords: &str,
        params: Vec<(String, String)>,
    ) -> Vec<ComparableRecord> {
        match self.search(operation, params).await {
            Ok(records) => {
                tracing::debug!(operation, keywords, count = records.len(), "marketplace search");
                records
            }
            Err(err) => {
                tracing::warn!(operation, keywords, error = %err, "marketplace search gave up; treating as no results");
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketplaceClient for EbayFindingClient {
    fn marketplace_name(&self) -> &'static str {
        "ebay_finding"
    }

    async fn find_sold(
        &self,
        keywords: &str,
        category_hint: Option<&str>,
    ) -> Vec<ComparableRecord> {
        let params = self.sold_params(keywords, category_hint);
        self.search_or_empty(OP_FIND_COMPLETED, keywords, params)
            .await
    }

    async fn find_active(&self, keywords: &str, price_range: PriceRange) -> Vec<ComparableRecord> {
        let params = self.active_params(keywords, price_range);
        self.search_or_empty(OP_FIND_BY_KEYWORDS, keywords, params)
            .await
    }
}

/// Sleep before retrying after the given failed attempt (1-based): 1s, 2s, 4s, then capped.
fn backoff_after(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    Duration::from_secs(1u64 << exp).min(MAX_BACKOFF)
}

/// `itemFilter(N).*` parameters, numbered in insertion order.
#[derive(Debug, Default)]
struct ItemFilters {
    entries: Vec<(String, String, Option<(String, String)>)>,
}

impl ItemFilters {
    fn push(&mut self, name: &str, value: &str, param: Option<(&str, &str)>) {
        self.entries.push((
            name.to_string(),
            value.to_string(),
            param.map(|(n, v)| (n.to_string(), v.to_string())),
        ));
    }

    fn append_to(self, params: &mut Vec<(String, String)>) {
        for (idx, (name, value, param)) in self.entries.into_iter().enumerate() {
            params.push((format!("itemFilter({idx}).name"), name));
            params.push((format!("itemFilter({idx}).value"), value));
            if let Some((param_name, param_value)) = param {
                params.push((format!("itemFilter({idx}).paramName"), param_name));
                params.push((format!("itemFilter({idx}).paramValue"), param_value));
            }
        }
    }
}
