use crate::advisory::error::AdvisoryDiagnosticsError;
use crate::advisory::parse;
use crate::advisory::{AdvisoryClient, Provider, VelocityInput, NO_ISSUES_SENTINEL};
use crate::config::Settings;
use crate::domain::opportunity::SaleVelocity;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 512;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Velocity answers are a single word.
const VELOCITY_MAX_TOKENS: u32 = 8;

#[derive(Debug, Clone)]
pub struct AnthropicAdvisor {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicAdvisor {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(&self, req: CreateMessageRequest) -> anyhow::Result<CreateMessageResponse> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            return Err(AdvisoryDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
            }
            .into());
        }

        serde_json::from_str::<CreateMessageResponse>(&text)
            .with_context(|| format!("failed to decode Anthropic response: {text}"))
    }

    async fn ask(&self, system: String, prompt: String, max_tokens: u32) -> anyhow::Result<String> {
        let req = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(system),
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };
        let res = self.create_message(req).await?;
        Ok(Self::response_text(&res))
    }

    fn title_system_prompt() -> String {
        [
            "You are a sports card expert reviewing marketplace listings.",
            "Analyze the listing title for red flags that might explain a low price.",
            "Check for terms like \"cracked slab\", \"qualifier\", \"(OC)\", \"off-center\",",
            "\"miscut\", \"scratches\", \"chipped\", or any other words that suggest a defect.",
            "If you find any, list them briefly.",
        ]
        .join("\n")
            + &format!("\nIf not, respond with exactly \"{NO_ISSUES_SENTINEL}\"")
    }

    fn velocity_system_prompt() -> String {
        [
            "You are a sports card investment analyst.",
            "Classify the market velocity of a card based on its recent sales history.",
            "Respond with only a single word: \"Quick\", \"Medium\", or \"Slow\".",
            "\"Quick\" means multiple sales per week.",
            "\"Medium\" means about one sale per week.",
            "\"Slow\" means less than one sale per week.",
        ]
        .join("\n")
    }

    fn velocity_prompt(input: &VelocityInput) -> String {
        format!(
            "Card: {}, Grade: {}, Recent Sales: {} sales in the last few weeks.\nClassification:",
            input.item_name, input.grade, input.recent_sales
        )
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            match block {
                ContentBlock::Text { text } => {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
                ContentBlock::Unknown => {}
            }
        }
        out
    }
}

#[async_trait::async_trait]
impl AdvisoryClient for AnthropicAdvisor {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn analyze_title(&self, title: &str) -> anyhow::Result<String> {
        let prompt = format!("Title: \"{title}\"\n\nAnalysis:");
        let text = self
            .ask(Self::title_system_prompt(), prompt, self.max_tokens)
            .await?;
        Ok(parse::normalize_analysis(&text))
    }

    async fn classify_velocity(&self, input: &VelocityInput) -> anyhow::Result<SaleVelocity> {
        let text = self
            .ask(
                Self::velocity_system_prompt(),
                Self::velocity_prompt(input),
                VELOCITY_MAX_TOKENS,
            )
            .await?;
        parse::parse_velocity(&text).map_err(|err| {
            AdvisoryDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "parse_velocity",
                detail: err.to_string(),
                raw_output: Some(text),
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Unknown,
}
