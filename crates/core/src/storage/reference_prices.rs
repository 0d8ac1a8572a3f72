use crate::domain::opportunity::SaleVelocity;
use crate::storage::price_cache::{PriceCache, PriceCacheEntry, PriceCacheStore};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

const UPSERT_BATCH: usize = 200;

/// Postgres-backed reference prices, one row per (item, grade).
#[derive(Debug, Clone)]
pub struct PgPriceCache {
    pool: sqlx::PgPool,
}

impl PgPriceCache {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PriceCacheStore for PgPriceCache {
    fn store_name(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self) -> anyhow::Result<PriceCache> {
        let rows = sqlx::query_as::<_, (String, String, Decimal, i32, String, DateTime<Utc>)>(
            "SELECT item_name, grade, reference_price, sample_size, sale_velocity, last_updated \
             FROM reference_prices \
             ORDER BY item_name ASC, grade ASC",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select reference_prices failed")?;

        let mut cache = PriceCache::default();
        for (item_name, grade, reference_price, sample_size, velocity, last_updated) in rows {
            let sale_velocity = SaleVelocity::parse(&velocity).unwrap_or_else(|| {
                tracing::warn!(%item_name, %grade, %velocity, "unknown sale_velocity in DB; using Slow");
                SaleVelocity::Slow
            });
            cache.insert(
                &item_name,
                &grade,
                PriceCacheEntry {
                    reference_price,
                    sample_size: usize::try_from(sample_size).unwrap_or(0),
                    last_updated,
                    sale_velocity,
                },
            );
        }
        Ok(cache)
    }

    async fn save(&self, cache: &PriceCache) -> anyhow::Result<()> {
        let rows: Vec<(&str, &str, &PriceCacheEntry)> = cache
            .iter()
            .filter_map(|(key, entry)| {
                let (item_name, grade) = crate::storage::price_cache::split_key(key)?;
                Some((item_name, grade, entry))
            })
            .collect();
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        for chunk in rows.chunks(UPSERT_BATCH) {
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO reference_prices (item_name, grade, reference_price, sample_size, sale_velocity, last_updated) ",
            );
            qb.push_values(chunk, |mut b, (item_name, grade, entry)| {
                b.push_bind(item_name.trim())
                    .push_bind(grade.trim())
                    .push_bind(entry.reference_price)
                    .push_bind(i32::try_from(entry.sample_size).unwrap_or(i32::MAX))
                    .push_bind(entry.sale_velocity.as_str())
                    .push_bind(entry.last_updated);
            });
            qb.push(
                " ON CONFLICT (item_name, grade) DO UPDATE \
                   SET reference_price = EXCLUDED.reference_price, sample_size = EXCLUDED.sample_size, \
                       sale_velocity = EXCLUDED.sale_velocity, last_updated = EXCLUDED.last_updated",
            );

            qb.build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("batch upsert reference_prices failed")?;
        }

        tx.commit().await.context("commit transaction failed")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RefreshRunRecord<'a> {
    pub started_at: DateTime<Utc>,
    pub status: &'a str,
    pub pairs: usize,
    pub refreshed: usize,
    pub skipped: usize,
    pub error: Option<&'a str>,
}

pub async fn record_refresh_run(
    pool: &sqlx::PgPool,
    run: &RefreshRunRecord<'_>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let finished_at = Utc::now();
    let as_i32 = |n: usize| i32::try_from(n).unwrap_or(i32::MAX);

    sqlx::query(
        "INSERT INTO refresh_runs (id, started_at, finished_at, status, pairs, refreshed, skipped, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .persistent(false)
    .bind(id)
    .bind(run.started_at)
    .bind(finished_at)
    .bind(run.status)
    .bind(as_i32(run.pairs))
    .bind(as_i32(run.refreshed))
    .bind(as_i32(run.skipped))
    .bind(run.error)
    .execute(pool)
    .await
    .context("insert refresh_runs failed")?;

    Ok(id)
}
