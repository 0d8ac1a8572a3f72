use crate::domain::error::QueryError;
use crate::domain::opportunity::SaleVelocity;

pub mod anthropic;
pub mod error;
pub mod parse;

pub const NO_ISSUES_SENTINEL: &str = "No obvious issues found in title.";
pub const ANALYSIS_UNAVAILABLE: &str = "Analysis unavailable.";

/// Fewer recent sales than this are classified `Slow` without asking the model.
pub const VELOCITY_MIN_SALES: usize = 3;

/// Only this many of the most recent sold comps count as "recent sales" for velocity.
pub const VELOCITY_HISTORY_LEN: usize = 10;

#[derive(Debug, Clone)]
pub enum Provider {
    Anthropic,
}

#[derive(Debug, Clone)]
pub struct VelocityInput {
    pub item_name: String,
    pub grade: String,
    pub recent_sales: usize,
}

/// Natural-language helper used for advisory text only. Nothing it returns feeds a price,
/// profit or score.
#[async_trait::async_trait]
pub trait AdvisoryClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn analyze_title(&self, title: &str) -> anyhow::Result<String>;

    async fn classify_velocity(&self, input: &VelocityInput) -> anyhow::Result<SaleVelocity>;
}

/// Red-flag analysis for a listing title. Provider failures come back as
/// [`ANALYSIS_UNAVAILABLE`]; only a blank title is an error.
pub async fn analyze_title_isolated(
    client: Option<&dyn AdvisoryClient>,
    title: &str,
) -> Result<String, QueryError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(QueryError::invalid("title", "listing title is required"));
    }

    let Some(client) = client else {
        return Ok(ANALYSIS_UNAVAILABLE.to_string());
    };

    match client.analyze_title(title).await {
        Ok(analysis) => Ok(analysis),
        Err(err) => {
            tracing::warn!(provider = ?client.provider(), error = %err, "title analysis failed; returning placeholder");
            Ok(ANALYSIS_UNAVAILABLE.to_string())
        }
    }
}

/// Velocity label for a pair; `Slow` on thin history or any provider failure.
pub async fn classify_velocity_isolated(
    client: Option<&dyn AdvisoryClient>,
    input: &VelocityInput,
) -> SaleVelocity {
    if input.recent_sales < VELOCITY_MIN_SALES {
        return SaleVelocity::Slow;
    }
    let Some(client) = client else {
        return SaleVelocity::Slow;
    };

    match client.classify_velocity(input).await {
        Ok(velocity) => velocity,
        Err(err) => {
            tracing::warn!(
                item_name = %input.item_name,
                grade = %input.grade,
                error = %err,
                "velocity classification failed; defaulting to Slow"
            );
            SaleVelocity::Slow
        }
    }
}
