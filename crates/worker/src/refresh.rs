use anyhow::Context;
use chrono::Utc;

use gradeflip_core::advisory::anthropic::AnthropicAdvisor;
use gradeflip_core::advisory::AdvisoryClient;
use gradeflip_core::config::Settings;
use gradeflip_core::domain::candidate::{CandidateQuery, HotlistFilter};
use gradeflip_core::engine::refresh::{refresh_reference_prices, RefreshSummary};
use gradeflip_core::engine::EngineConfig;
use gradeflip_core::marketplace::MarketplaceClient;
use gradeflip_core::storage::hotlist::load_candidates;
use gradeflip_core::storage::lock::{release_refresh_lock, try_acquire_refresh_lock};
use gradeflip_core::storage::price_cache::{FilePriceCache, PriceCacheStore};
use gradeflip_core::storage::reference_prices::{record_refresh_run, PgPriceCache, RefreshRunRecord};

/// Connects and migrates when `DATABASE_URL` is set. A configured but unreachable database
/// is an error; the worker does not silently fall back.
pub async fn connect_db(settings: &Settings) -> anyhow::Result<Option<sqlx::PgPool>> {
    let Some(db_url) = settings.database_url.as_deref() else {
        return Ok(None);
    };

    // The refresh lock is session-scoped, so lock and unlock must share a connection.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    gradeflip_core::storage::migrate(&pool).await?;
    Ok(Some(pool))
}

pub fn price_store(settings: &Settings, pool: Option<sqlx::PgPool>) -> Box<dyn PriceCacheStore> {
    match pool {
        Some(pool) => Box::new(PgPriceCache::new(pool)),
        None => Box::new(FilePriceCache::new(&settings.price_cache_path)),
    }
}

pub async fn run(
    settings: &Settings,
    marketplace: &dyn MarketplaceClient,
    config: &EngineConfig,
    dry_run: bool,
) -> anyhow::Result<()> {
    let candidates = load_candidates(&settings.hotlist_path, &HotlistFilter::default()).await?;

    let advisory = match AnthropicAdvisor::from_settings(settings) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "advisory client unavailable; every pair will be labelled Slow");
            None
        }
    };
    let advisory = advisory.as_ref().map(|c| c as &dyn AdvisoryClient);

    let pool = match connect_db(settings).await? {
        Some(pool) if !dry_run => pool,
        pool => {
            let store = price_store(settings, pool);
            refresh_into(store.as_ref(), marketplace, advisory, config, &candidates, dry_run).await?;
            return Ok(());
        }
    };

    let acquired = try_acquire_refresh_lock(&pool).await?;
    if !acquired {
        tracing::warn!("refresh lock not acquired; another run in progress");
        return Ok(());
    }

    let started_at = Utc::now();
    let store = PgPriceCache::new(pool.clone());
    let result = refresh_into(&store, marketplace, advisory, config, &candidates, false).await;

    let summary = result.as_ref().copied().unwrap_or_default();
    let error = result.as_ref().err().map(|e| format!("{e:#}"));
    let run_id = record_refresh_run(
        &pool,
        &RefreshRunRecord {
            started_at,
            status: if result.is_ok() { "success" } else { "failure" },
            pairs: summary.pairs,
            refreshed: summary.refreshed,
            skipped: summary.skipped,
            error: error.as_deref(),
        },
    )
    .await?;
    tracing::info!(%run_id, "recorded refresh run");

    let _ = release_refresh_lock(&pool).await;
    result.map(|_| ())
}

/// Loads the current cache, refreshes every pair into it and saves it back unless
/// `dry_run` is set. Pairs with too few sold comps keep their previous entry.
pub async fn refresh_into(
    store: &dyn PriceCacheStore,
    marketplace: &dyn MarketplaceClient,
    advisory: Option<&dyn AdvisoryClient>,
    config: &EngineConfig,
    candidates: &[CandidateQuery],
    dry_run: bool,
) -> anyhow::Result<RefreshSummary> {
    let mut cache = store.load().await?;
    let summary =
        refresh_reference_prices(marketplace, advisory, config, candidates, &mut cache, Utc::now())
            .await;

    if dry_run {
        tracing::info!(
            store = store.store_name(),
            dry_run = true,
            pairs = summary.pairs,
            refreshed = summary.refreshed,
            skipped = summary.skipped,
            "refresh finished; nothing written"
        );
        return Ok(summary);
    }

    store.save(&cache).await?;
    tracing::info!(
        store = store.store_name(),
        pairs = summary.pairs,
        refreshed = summary.refreshed,
        skipped = summary.skipped,
        entries = cache.len(),
        "reference prices saved"
    );
    Ok(summary)
}
