use crate::domain::opportunity::SaleVelocity;
use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

const KEY_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCacheEntry {
    #[serde(alias = "price")]
    pub reference_price: Decimal,
    #[serde(default)]
    pub sample_size: usize,
    pub last_updated: DateTime<Utc>,
    #[serde(rename = "qualitativeVelocity", alias = "saleProbability")]
    pub sale_velocity: SaleVelocity,
}

/// Reference prices keyed by `"<itemName> | <grade>"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceCache {
    entries: BTreeMap<String, PriceCacheEntry>,
}

pub fn cache_key(item_name: &str, grade: &str) -> String {
    format!("{}{KEY_SEPARATOR}{}", item_name.trim(), grade.trim())
}

pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (item_name, grade) = key.rsplit_once(KEY_SEPARATOR)?;
    if item_name.trim().is_empty() || grade.trim().is_empty() {
        return None;
    }
    Some((item_name, grade))
}

impl PriceCache {
    pub fn get(&self, item_name: &str, grade: &str) -> Option<&PriceCacheEntry> {
        self.entries.get(&cache_key(item_name, grade))
    }

    pub fn insert(&mut self, item_name: &str, grade: &str, entry: PriceCacheEntry) {
        self.entries.insert(cache_key(item_name, grade), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PriceCacheEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Where reference prices live between refresh runs. A store that does not exist yet loads
/// as an empty cache.
#[async_trait::async_trait]
pub trait PriceCacheStore: Send + Sync {
    fn store_name(&self) -> &'static str;

    async fn load(&self) -> anyhow::Result<PriceCache>;

    async fn save(&self, cache: &PriceCache) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FilePriceCache {
    path: PathBuf,
}

impl FilePriceCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl PriceCacheStore for FilePriceCache {
    fn store_name(&self) -> &'static str {
        "json_file"
    }

    async fn load(&self) -> anyhow::Result<PriceCache> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "price cache not found; starting empty");
                return Ok(PriceCache::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read price cache {}", self.path.display()))
            }
        };

        serde_json::from_str::<PriceCache>(&text)
            .with_context(|| format!("price cache {} is not valid JSON", self.path.display()))
    }

    async fn save(&self, cache: &PriceCache) -> anyhow::Result<()> {
        let body = serde_json::to_string_pretty(cache).context("failed to serialize price cache")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
