use crate::advisory::NO_ISSUES_SENTINEL;
use crate::domain::opportunity::SaleVelocity;
use anyhow::Context;

/// The model must answer with exactly one of `Quick`, `Medium` or `Slow`.
pub fn parse_velocity(text: &str) -> anyhow::Result<SaleVelocity> {
    let word = text.trim();
    SaleVelocity::parse(word).with_context(|| format!("unexpected velocity answer: {word:?}"))
}

/// Trims the model's title analysis. An empty answer counts as "no issues".
pub fn normalize_analysis(text: &str) -> String {
    let trimmed = strip_fences(text.trim());
    if trimmed.is_empty() {
        NO_ISSUES_SENTINEL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn strip_fences(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let mut inner = text;
    if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
        inner = after_first;
    }
    if let Some(end) = inner.rfind("```") {
        inner = &inner[..end];
    }
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_accepts_surrounding_whitespace_only() {
        assert_eq!(parse_velocity(" Quick\n").unwrap(), SaleVelocity::Quick);
        assert_eq!(parse_velocity("Medium").unwrap(), SaleVelocity::Medium);
        assert!(parse_velocity("Quick.").is_err());
        assert!(parse_velocity("The card sells Slow").is_err());
    }

    #[test]
    fn analysis_strips_fences_and_defaults_to_sentinel() {
        assert_eq!(
            normalize_analysis("```\n- \"(OC)\" suggests off-center\n```"),
            "- \"(OC)\" suggests off-center"
        );
        assert_eq!(normalize_analysis("   "), NO_ISSUES_SENTINEL);
        assert_eq!(normalize_analysis(" Cracked slab. "), "Cracked slab.");
    }
}
