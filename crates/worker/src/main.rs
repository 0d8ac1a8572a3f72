use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gradeflip_core::config::Settings;
use gradeflip_core::domain::candidate::HotlistFilter;
use gradeflip_core::engine::deal::{annotate_velocity, DealPipeline};
use gradeflip_core::engine::opportunity::OpportunityPipeline;
use gradeflip_core::engine::EngineConfig;
use gradeflip_core::marketplace::ebay::EbayFindingClient;
use gradeflip_core::marketplace::{MarketplaceClient, PriceRange};
use gradeflip_core::storage::hotlist::load_candidates;

mod refresh;

#[derive(Debug, Parser)]
#[command(name = "gradeflip_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recompute the reference price of every hotlist pair and store it.
    RefreshPrices {
        /// Do everything except writing the refreshed prices.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print ranked grading opportunities as JSON.
    Opportunities {
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        sport: Option<String>,
    },

    /// Print ranked deals on graded listings as JSON.
    Deals {
        #[arg(long)]
        min_price: Option<Decimal>,

        #[arg(long)]
        max_price: Option<Decimal>,

        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let result = run(&settings, args.command).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker command failed");
    }
    result
}

async fn run(settings: &Settings, command: Command) -> anyhow::Result<()> {
    let config = Arc::new(EngineConfig::from_env()?);
    let marketplace: Arc<dyn MarketplaceClient> =
        Arc::new(EbayFindingClient::from_settings(settings)?);

    match command {
        Command::RefreshPrices { dry_run } => {
            refresh::run(settings, marketplace.as_ref(), &config, dry_run).await
        }
        Command::Opportunities { limit, year, sport } => {
            let candidates = load_candidates(&settings.hotlist_path, &HotlistFilter { year, sport }).await?;
            let limit = limit.unwrap_or(config.max_results);
            let opportunities = OpportunityPipeline::new(marketplace, config)
                .run_ranked(&candidates, limit)
                .await;
            print_json(&opportunities)
        }
        Command::Deals {
            min_price,
            max_price,
            limit,
        } => {
            let range = PriceRange::new(min_price, max_price)?;
            let candidates = load_candidates(&settings.hotlist_path, &HotlistFilter::default()).await?;
            let limit = limit.unwrap_or(config.max_results);
            let mut deals = DealPipeline::new(marketplace, config)
                .run_ranked(&candidates, range, limit)
                .await;

            let store = refresh::price_store(settings, refresh::connect_db(settings).await?);
            match store.load().await {
                Ok(cache) => annotate_velocity(&mut deals, &cache),
                Err(e) => tracing::warn!(error = %e, "price cache unavailable; deals printed without velocity"),
            }
            print_json(&deals)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
