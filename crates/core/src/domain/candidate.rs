use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// An item plus the grades worth pricing it at. Immutable for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuery {
    pub item_name: String,
    pub target_grades: Vec<String>,
}

/// Hotlist entry as written in the candidate file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotlistEntry {
    pub name: String,
    pub grades: Vec<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub sport: Option<String>,
}

/// Optional tag filters applied to the hotlist before a run.
#[derive(Debug, Clone, Default)]
pub struct HotlistFilter {
    pub year: Option<String>,
    pub sport: Option<String>,
}

impl HotlistFilter {
    /// An entry without a tag is not excluded by a filter on that tag.
    pub fn matches(&self, entry: &HotlistEntry) -> bool {
        tag_matches(self.year.as_deref(), entry.year.as_deref())
            && tag_matches(self.sport.as_deref(), entry.sport.as_deref())
    }
}

fn tag_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match (wanted.map(str::trim).filter(|s| !s.is_empty()), actual) {
        (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual.trim()),
        _ => true,
    }
}

impl HotlistEntry {
    pub fn validate_and_into_query(self) -> anyhow::Result<CandidateQuery> {
        let item_name = self.name.trim().to_string();
        ensure!(!item_name.is_empty(), "hotlist entry name must be non-empty");

        let mut target_grades: Vec<String> = Vec::with_capacity(self.grades.len());
        for grade in self.grades {
            let grade = grade.trim().to_string();
            if grade.is_empty() || target_grades.contains(&grade) {
                continue;
            }
            target_grades.push(grade);
        }
        ensure!(
            !target_grades.is_empty(),
            "hotlist entry {item_name:?} must list at least one grade"
        );

        Ok(CandidateQuery {
            item_name,
            target_grades,
        })
    }
}

/// Validates entries matching `filter`, in file order.
pub fn queries_from_hotlist(
    entries: Vec<HotlistEntry>,
    filter: &HotlistFilter,
) -> anyhow::Result<Vec<CandidateQuery>> {
    entries
        .into_iter()
        .filter(|entry| filter.matches(entry))
        .map(HotlistEntry::validate_and_into_query)
        .collect()
}
