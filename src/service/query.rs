use crate::storage::note::ProblemNote;

/// Multi-criteria filter over the collection. All predicates are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Lowercased free text; empty matches everything.
    pub text: String,
    /// Exact decimal rating, e.g. "1900".
    pub rating_equals: Option<String>,
    /// Lowercased, trimmed, non-empty tag terms; every one must match.
    pub tags_all_of: Vec<String>,
}

impl FilterCriteria {
    /// Build criteria from raw input fields. `tags` is comma separated.
    pub fn from_inputs(text: &str, rating: &str, tags: &str) -> Self {
        let rating = rating.trim();
        FilterCriteria {
            text: text.to_lowercase(),
            rating_equals: (!rating.is_empty()).then(|| rating.to_string()),
            tags_all_of: tags
                .to_lowercase()
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.rating_equals.is_none() && self.tags_all_of.is_empty()
    }

    pub fn matches(&self, note: &ProblemNote) -> bool {
        self.matches_text(note) && self.matches_rating(note) && self.matches_tags(note)
    }

    fn matches_text(&self, note: &ProblemNote) -> bool {
        if self.text.is_empty() {
            return true;
        }
        let tags = note.tags.as_deref().unwrap_or_default().join(" ");
        [
            note.link.as_str(),
            note.notes.as_str(),
            note.name.as_deref().unwrap_or(""),
            tags.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&self.text))
    }

    fn matches_rating(&self, note: &ProblemNote) -> bool {
        match (&self.rating_equals, note.rating) {
            (None, _) => true,
            (Some(wanted), Some(rating)) => rating.to_string() == *wanted,
            (Some(_), None) => false,
        }
    }

    fn matches_tags(&self, note: &ProblemNote) -> bool {
        if self.tags_all_of.is_empty() {
            return true;
        }
        let Some(tags) = note.tags.as_ref() else {
            return false;
        };
        let tags: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
        self.tags_all_of
            .iter()
            .all(|term| tags.iter().any(|tag| tag.contains(term.as_str())))
    }
}

/// Records passing `criteria`, in collection order.
pub fn filter<'a>(notes: &'a [ProblemNote], criteria: &FilterCriteria) -> Vec<&'a ProblemNote> {
    notes.iter().filter(|note| criteria.matches(note)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(raw: serde_json::Value) -> ProblemNote {
        serde_json::from_value(raw).unwrap()
    }

    fn ids<'a>(notes: &[&'a ProblemNote]) -> Vec<&'a str> {
        notes.iter().map(|n| n.id.as_str()).collect()
    }

    fn sample() -> Vec<ProblemNote> {
        vec![
            note(json!({"id": "1", "link": "https://codeforces.com/contest/1/problem/A", "notes": "Use ceil division",
                "name": "Theatre Square", "rating": 1000, "tags": ["math"]})),
            note(json!({"id": "2", "link": "https://codeforces.com/contest/2/problem/B", "notes": "",
                "name": "Knapsack Trick", "rating": 1900, "tags": ["dp", "graphs"]})),
            note(json!({"id": "3", "link": "https://codeforces.com/contest/3/problem/C", "notes": "memo",
                "name": "Counting", "rating": 1900, "tags": ["DP"]})),
            note(json!({"id": "4", "link": "https://example.com/x", "notes": "Remember GRAPHS", "name": "https://example.com/x"})),
        ]
    }

    #[test]
    fn test_empty_criteria_matches_all_in_order() {
        let notes = sample();
        let criteria = FilterCriteria::from_inputs("", "", "");
        assert!(criteria.is_empty());
        assert_eq!(ids(&filter(&notes, &criteria)), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_text_searches_link_notes_name_and_tags() {
        let notes = sample();
        assert_eq!(ids(&filter(&notes, &FilterCriteria::from_inputs("THEATRE", "", ""))), vec!["1"]);
        assert_eq!(ids(&filter(&notes, &FilterCriteria::from_inputs("ceil", "", ""))), vec!["1"]);
        assert_eq!(ids(&filter(&notes, &FilterCriteria::from_inputs("example.com", "", ""))), vec!["4"]);
        assert_eq!(ids(&filter(&notes, &FilterCriteria::from_inputs("graphs", "", ""))), vec!["2", "4"]);
        assert_eq!(ids(&filter(&notes, &FilterCriteria::from_inputs("dp graphs", "", ""))), vec!["2"]);
    }

    #[test]
    fn test_tags_all_of_is_and_across_terms() {
        let notes = sample();
        let criteria = FilterCriteria::from_inputs("", "", "dp, gr");
        assert_eq!(criteria.tags_all_of, vec!["dp".to_string(), "gr".to_string()]);
        assert_eq!(ids(&filter(&notes, &criteria)), vec!["2"]);

        // Case-insensitive substring within the record's tags.
        assert_eq!(ids(&filter(&notes, &FilterCriteria::from_inputs("", "", "Dp,,"))), vec!["2", "3"]);
        // Untagged records never match a tag filter.
        assert!(!ids(&filter(&notes, &FilterCriteria::from_inputs("", "", "x"))).contains(&"4"));
    }

    #[test]
    fn test_rating_is_exact_match() {
        let notes = sample();
        assert_eq!(ids(&filter(&notes, &FilterCriteria::from_inputs("", "1900", ""))), vec!["2", "3"]);
        assert!(filter(&notes, &FilterCriteria::from_inputs("", "1901", "")).is_empty());
        assert!(filter(&notes, &FilterCriteria::from_inputs("", "190", "")).is_empty());
        assert!(!ids(&filter(&notes, &FilterCriteria::from_inputs("", "0", ""))).contains(&"4"));
    }

    #[test]
    fn test_predicates_are_anded() {
        let notes = sample();
        let criteria = FilterCriteria::from_inputs("memo", "1900", "dp");
        assert_eq!(ids(&filter(&notes, &criteria)), vec!["3"]);
        let criteria = FilterCriteria::from_inputs("knapsack", "1900", "math");
        assert!(filter(&notes, &criteria).is_empty());
    }
}
