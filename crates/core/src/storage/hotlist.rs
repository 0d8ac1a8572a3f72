use crate::domain::candidate::{queries_from_hotlist, CandidateQuery, HotlistEntry, HotlistFilter};
use anyhow::Context;
use std::path::Path;

pub async fn load_hotlist(path: impl AsRef<Path>) -> anyhow::Result<Vec<HotlistEntry>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read hotlist {}", path.display()))?;
    parse_hotlist(&text).with_context(|| format!("invalid hotlist {}", path.display()))
}

pub fn parse_hotlist(text: &str) -> anyhow::Result<Vec<HotlistEntry>> {
    serde_json::from_str::<Vec<HotlistEntry>>(text).context("hotlist must be a JSON array of {name, grades}")
}

/// Loads, filters and validates the hotlist into pipeline candidates.
pub async fn load_candidates(
    path: impl AsRef<Path>,
    filter: &HotlistFilter,
) -> anyhow::Result<Vec<CandidateQuery>> {
    let entries = load_hotlist(path).await?;
    queries_from_hotlist(entries, filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_and_untagged_entries() {
        let text = r#"[
            {"name": "2018 Topps Update Ronald Acuna Jr. #US250", "grades": ["PSA 10", "PSA 9"]},
            {"name": "2011 Topps Update Mike Trout #US175", "grades": ["PSA 10"], "year": "2011", "sport": "Baseball"}
        ]"#;
        let entries = parse_hotlist(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].year.as_deref(), Some("2011"));
    }

    #[test]
    fn rejects_non_array() {
        assert!(parse_hotlist(r#"{"name": "x"}"#).is_err());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("gradeflip-no-such-hotlist.json");
        assert!(load_hotlist(&path).await.is_err());
    }
}
