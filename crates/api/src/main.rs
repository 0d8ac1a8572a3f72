use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gradeflip_core::advisory::anthropic::AnthropicAdvisor;
use gradeflip_core::advisory::{analyze_title_isolated, AdvisoryClient};
use gradeflip_core::domain::candidate::HotlistFilter;
use gradeflip_core::domain::error::QueryError;
use gradeflip_core::domain::opportunity::{Deal, ListingSummary, Opportunity};
use gradeflip_core::engine::deal::{annotate_velocity, DealPipeline};
use gradeflip_core::engine::listings::listings_for_item;
use gradeflip_core::engine::opportunity::OpportunityPipeline;
use gradeflip_core::engine::EngineConfig;
use gradeflip_core::marketplace::ebay::EbayFindingClient;
use gradeflip_core::marketplace::{MarketplaceClient, PriceRange};
use gradeflip_core::storage::hotlist::load_candidates;
use gradeflip_core::storage::price_cache::{FilePriceCache, PriceCache, PriceCacheStore};
use gradeflip_core::storage::reference_prices::PgPriceCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = gradeflip_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let config = Arc::new(EngineConfig::from_env()?);
    let marketplace: Arc<dyn MarketplaceClient> =
        Arc::new(EbayFindingClient::from_settings(&settings)?);

    let advisory: Option<Arc<dyn AdvisoryClient>> = match AnthropicAdvisor::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "advisory client unavailable; title analysis and velocity degrade to placeholders");
            None
        }
    };

    let prices = open_price_store(&settings).await;
    tracing::info!(store = prices.store_name(), "reference price store ready");

    let state = AppState {
        marketplace,
        advisory,
        config,
        hotlist_path: PathBuf::from(&settings.hotlist_path),
        prices,
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/grading-opportunities", get(grading_opportunities))
        .route("/api/top-deals", get(top_deals))
        .route("/api/raw-listings", get(raw_listings))
        .route("/api/listing-analysis", post(listing_analysis))
        .route("/api/reference-prices", get(reference_prices))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// Postgres when it is configured and reachable, the JSON file otherwise.
async fn open_price_store(settings: &gradeflip_core::config::Settings) -> Arc<dyn PriceCacheStore> {
    let file_store = || -> Arc<dyn PriceCacheStore> {
        Arc::new(FilePriceCache::new(&settings.price_cache_path))
    };

    let Some(db_url) = settings.database_url.as_deref() else {
        return file_store();
    };

    match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
    {
        Ok(pool) => match gradeflip_core::storage::migrate(&pool).await {
            Ok(()) => Arc::new(PgPriceCache::new(pool)),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "db migrations failed; falling back to the price cache file");
                file_store()
            }
        },
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; falling back to the price cache file");
            file_store()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    marketplace: Arc<dyn MarketplaceClient>,
    advisory: Option<Arc<dyn AdvisoryClient>>,
    config: Arc<EngineConfig>,
    hotlist_path: PathBuf,
    prices: Arc<dyn PriceCacheStore>,
}

#[derive(Debug, Default, Deserialize)]
struct OpportunityParams {
    year: Option<String>,
    sport: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DealParams {
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListingParams {
    card_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    analysis: String,
}

async fn grading_opportunities(
    State(state): State<AppState>,
    Query(params): Query<OpportunityParams>,
) -> Result<Json<Vec<Opportunity>>, StatusCode> {
    let filter = HotlistFilter {
        year: params.year,
        sport: params.sport,
    };
    let candidates = load_candidates(&state.hotlist_path, &filter)
        .await
        .map_err(internal_error)?;

    let limit = params.limit.unwrap_or(state.config.max_results);
    let pipeline = OpportunityPipeline::new(state.marketplace.clone(), state.config.clone());
    Ok(Json(pipeline.run_ranked(&candidates, limit).await))
}

async fn top_deals(
    State(state): State<AppState>,
    Query(params): Query<DealParams>,
) -> Result<Json<Vec<Deal>>, StatusCode> {
    let range = PriceRange::new(params.min_price, params.max_price).map_err(bad_request)?;
    let candidates = load_candidates(&state.hotlist_path, &HotlistFilter::default())
        .await
        .map_err(internal_error)?;

    let limit = params.limit.unwrap_or(state.config.max_results);
    let pipeline = DealPipeline::new(state.marketplace.clone(), state.config.clone());
    let mut deals = pipeline.run_ranked(&candidates, range, limit).await;

    match state.prices.load().await {
        Ok(cache) => annotate_velocity(&mut deals, &cache),
        Err(e) => tracing::warn!(
            store = state.prices.store_name(),
            error = %e,
            "price cache unavailable; deals returned without velocity"
        ),
    }

    Ok(Json(deals))
}

async fn raw_listings(
    State(state): State<AppState>,
    Query(params): Query<RawListingParams>,
) -> Result<Json<Vec<ListingSummary>>, StatusCode> {
    let card_name = params.card_name.unwrap_or_default();
    let listings = listings_for_item(&*state.marketplace, &state.config.keywords, &card_name)
        .await
        .map_err(bad_request)?;
    Ok(Json(listings))
}

async fn listing_analysis(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, StatusCode> {
    let title = req.title.unwrap_or_default();
    let analysis = analyze_title_isolated(state.advisory.as_deref(), &title)
        .await
        .map_err(bad_request)?;
    Ok(Json(AnalysisResponse { analysis }))
}

async fn reference_prices(State(state): State<AppState>) -> Result<Json<PriceCache>, StatusCode> {
    let cache = state.prices.load().await.map_err(internal_error)?;
    Ok(Json(cache))
}

fn bad_request(err: QueryError) -> StatusCode {
    tracing::info!(error = %err, "rejected request");
    StatusCode::BAD_REQUEST
}

fn internal_error(err: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %format!("{err:#}"), "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &gradeflip_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
