pub mod advisory;
pub mod domain;
pub mod engine;
pub mod marketplace;
pub mod storage;

pub mod config {
    use anyhow::Context;

    const DEFAULT_HOTLIST_PATH: &str = "hotlist.json";
    const DEFAULT_PRICE_CACHE_PATH: &str = "reference_prices.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub marketplace_base_url: Option<String>,
        pub marketplace_app_id: Option<String>,
        pub hotlist_path: String,
        pub price_cache_path: String,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                marketplace_base_url: non_empty_var("MARKETPLACE_BASE_URL"),
                marketplace_app_id: non_empty_var("MARKETPLACE_APP_ID"),
                hotlist_path: non_empty_var("HOTLIST_PATH")
                    .unwrap_or_else(|| DEFAULT_HOTLIST_PATH.to_string()),
                price_cache_path: non_empty_var("PRICE_CACHE_PATH")
                    .unwrap_or_else(|| DEFAULT_PRICE_CACHE_PATH.to_string()),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_marketplace_app_id(&self) -> anyhow::Result<&str> {
            self.marketplace_app_id
                .as_deref()
                .context("MARKETPLACE_APP_ID is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }
}
