use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One saved problem with the user's notes and whatever metadata could be
/// resolved for its link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemNote {
    pub id: String,
    pub link: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Fields written by other versions of the tool, kept so export/import
    /// does not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProblemNote {
    /// Create a new record with a fresh id and the current time
    pub fn new(link: String, notes: String, metadata: NoteMetadata) -> Self {
        let mut note = ProblemNote {
            id: generate_id(&link),
            link,
            notes,
            date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            name: None,
            rating: None,
            tags: None,
            contest_id: None,
            index: None,
            extra: Map::new(),
        };
        note.apply_metadata(metadata);
        note
    }

    /// Title shown in lists: the resolved name, falling back to the link.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.link)
    }

    pub fn is_resolved(&self) -> bool {
        self.name.as_deref().is_some_and(|name| name != self.link)
    }

    pub fn metadata(&self) -> NoteMetadata {
        NoteMetadata {
            name: self.name.clone(),
            rating: self.rating,
            tags: self.tags.clone(),
            contest_id: self.contest_id.clone(),
            index: self.index.clone(),
        }
    }

    /// Overwrite the whole metadata group at once.
    pub fn apply_metadata(&mut self, metadata: NoteMetadata) {
        self.name = metadata.name;
        self.rating = metadata.rating;
        self.tags = metadata.tags;
        self.contest_id = metadata.contest_id;
        self.index = metadata.index;
    }

    /// Creation time in milliseconds since the epoch. Missing or unparseable
    /// dates count as the epoch so they sort last.
    pub fn timestamp_millis(&self) -> i64 {
        parse_date(&self.date).map(|d| d.timestamp_millis()).unwrap_or(0)
    }

    pub fn rating_tier(&self) -> RatingTier {
        RatingTier::from_rating(self.rating)
    }
}

/// The metadata group of a record. Travels as a unit so a record is either
/// fully resolved or carries only `name == link`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteMetadata {
    pub name: Option<String>,
    pub rating: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub contest_id: Option<String>,
    pub index: Option<String>,
}

impl NoteMetadata {
    pub fn unresolved(link: &str) -> Self {
        NoteMetadata {
            name: Some(link.to_string()),
            ..Default::default()
        }
    }
}

/// Codeforces colour bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTier {
    Gray,
    Green,
    Cyan,
    Blue,
    Violet,
    Orange,
    Red,
}

impl RatingTier {
    pub fn from_rating(rating: Option<i64>) -> Self {
        match rating {
            None => RatingTier::Gray,
            Some(r) if r < 1200 => RatingTier::Gray,
            Some(r) if r < 1400 => RatingTier::Green,
            Some(r) if r < 1600 => RatingTier::Cyan,
            Some(r) if r < 1900 => RatingTier::Blue,
            Some(r) if r < 2100 => RatingTier::Violet,
            Some(r) if r < 2400 => RatingTier::Orange,
            Some(_) => RatingTier::Red,
        }
    }
}

/// Generate a unique id using an MD5 hash of the link and nanosecond timestamp
pub fn generate_id(link: &str) -> String {
    format!(
        "{:x}",
        md5::compute(format!("{}{}", link, Utc::now().timestamp_nanos_opt().unwrap_or(0)))
    )
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_note_unresolved_uses_link_as_name() {
        let link = "https://example.com/x".to_string();
        let note = ProblemNote::new(link.clone(), String::new(), NoteMetadata::unresolved(&link));
        assert_eq!(note.display_name(), link);
        assert!(!note.is_resolved());
        assert!(note.rating.is_none());
        assert!(note.tags.is_none());
        assert!(parse_date(&note.date).is_some());
        assert_eq!(note.id.len(), 32);
    }

    #[test]
    fn test_serializes_camel_case_and_skips_absent_fields() {
        let mut note = ProblemNote::new(
            "https://codeforces.com/contest/1/problem/A".to_string(),
            "n".to_string(),
            NoteMetadata {
                name: Some("Theatre Square".to_string()),
                rating: Some(1000),
                tags: Some(vec!["math".to_string()]),
                contest_id: Some("1".to_string()),
                index: Some("A".to_string()),
            },
        );
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["contestId"], "1");
        assert_eq!(json["rating"], 1000);

        note.apply_metadata(NoteMetadata::unresolved(&note.link.clone()));
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("rating").is_none());
        assert!(json.get("contestId").is_none());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = r#"{"id":"1","link":"a","notes":"","date":"","starred":true}"#;
        let note: ProblemNote = serde_json::from_str(raw).unwrap();
        assert_eq!(note.extra.get("starred"), Some(&Value::Bool(true)));
        let back = serde_json::to_value(&note).unwrap();
        assert_eq!(back["starred"], true);
    }

    #[test]
    fn test_timestamp_falls_back_to_epoch() {
        let mut note: ProblemNote = serde_json::from_str(r#"{"id":"1","link":"a"}"#).unwrap();
        assert_eq!(note.timestamp_millis(), 0);
        note.date = "not a date".to_string();
        assert_eq!(note.timestamp_millis(), 0);
        note.date = "2024-03-01".to_string();
        assert!(note.timestamp_millis() > 0);
        note.date = "2024-03-01T10:00:00.000Z".to_string();
        assert_eq!(note.timestamp_millis(), 1_709_287_200_000);
    }

    #[test]
    fn test_parse_date_without_offset_is_utc() {
        let expected = parse_date("2024-03-01T10:00:00.000Z");
        assert!(expected.is_some());
        assert_eq!(parse_date("2024-03-01T10:00:00"), expected);
        assert_eq!(parse_date("2024-03-01T10:00:00.000"), expected);
    }

    #[test]
    fn test_rating_tiers() {
        assert_eq!(RatingTier::from_rating(None), RatingTier::Gray);
        assert_eq!(RatingTier::from_rating(Some(800)), RatingTier::Gray);
        assert_eq!(RatingTier::from_rating(Some(1200)), RatingTier::Green);
        assert_eq!(RatingTier::from_rating(Some(1599)), RatingTier::Cyan);
        assert_eq!(RatingTier::from_rating(Some(1900)), RatingTier::Violet);
        assert_eq!(RatingTier::from_rating(Some(2399)), RatingTier::Orange);
        assert_eq!(RatingTier::from_rating(Some(3500)), RatingTier::Red);
    }
}
