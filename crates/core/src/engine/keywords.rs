/// Builds search expressions for the raw and graded sides of a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordPolicy {
    grading_exclusions: Vec<String>,
}

pub const DEFAULT_GRADING_EXCLUSIONS: [&str; 4] = ["PSA", "BGS", "SGC", "CGC"];

impl Default for KeywordPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_GRADING_EXCLUSIONS.iter().map(|s| s.to_string()))
    }
}

impl KeywordPolicy {
    pub fn new(exclusions: impl IntoIterator<Item = String>) -> Self {
        let grading_exclusions = exclusions
            .into_iter()
            .map(|s| s.trim().trim_start_matches('-').trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { grading_exclusions }
    }

    /// Reads `GRADING_EXCLUSIONS="PSA,BGS,..."`; falls back to the default list.
    pub fn from_env() -> Self {
        match std::env::var("GRADING_EXCLUSIONS") {
            Ok(s) if !s.trim().is_empty() => {
                Self::new(s.split(',').map(|part| part.to_string()))
            }
            _ => Self::default(),
        }
    }

    /// Item name with every grading-company token excluded.
    pub fn raw(&self, item_name: &str) -> String {
        let mut out = collapse_whitespace(item_name);
        for token in &self.grading_exclusions {
            out.push_str(" -");
            out.push_str(token);
        }
        out
    }

    pub fn target(&self, item_name: &str, grade: &str) -> String {
        format!("{} {}", collapse_whitespace(item_name), collapse_whitespace(grade))
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_excludes_grading_companies() {
        let policy = KeywordPolicy::default();
        assert_eq!(
            policy.raw("2018 Topps  Update Acuna"),
            "2018 Topps Update Acuna -PSA -BGS -SGC -CGC"
        );
    }

    #[test]
    fn target_appends_grade() {
        let policy = KeywordPolicy::default();
        assert_eq!(policy.target(" Acuna #US250 ", "PSA 10"), "Acuna #US250 PSA 10");
    }

    #[test]
    fn custom_exclusions_are_normalized() {
        let policy = KeywordPolicy::new(vec![" -PSA".to_string(), "".to_string(), "BGS ".to_string()]);
        assert_eq!(policy.raw("Card"), "Card -PSA -BGS");
    }
}
