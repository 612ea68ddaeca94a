//! Merging incoming data into stored records by id.

use crate::storage::note::{NoteMetadata, ProblemNote};
use serde_json::{Map, Value};
use std::cmp::Reverse;
use thiserror::Error;

/// Fields an edit may change. `id` and `date` are deliberately absent.
#[derive(Debug, Clone)]
pub struct NotePatch {
    pub link: String,
    pub notes: String,
    pub metadata: NoteMetadata,
}

/// Apply an edit on top of an existing record.
pub fn merge_existing(old: &ProblemNote, patch: NotePatch) -> ProblemNote {
    let mut merged = old.clone();
    merged.link = patch.link;
    merged.notes = patch.notes;
    merged.apply_metadata(patch.metadata);
    merged
}

/// Why an imported entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("entry is not an object")]
    NotAnObject,
    #[error("entry has no id")]
    MissingId,
    #[error("entry has no link")]
    MissingLink,
    #[error("entry has malformed fields: {0}")]
    Malformed(String),
}

/// Merge one imported entry onto the existing record with the same id, or
/// take it as-is when there is none. Incoming fields win; fields the entry
/// does not mention keep their stored values.
pub fn merge_imported(existing: Option<&ProblemNote>, incoming: &Value) -> Result<ProblemNote, Rejection> {
    let incoming = incoming.as_object().ok_or(Rejection::NotAnObject)?;
    if !non_empty_str(incoming, "id") {
        return Err(Rejection::MissingId);
    }
    if !non_empty_str(incoming, "link") {
        return Err(Rejection::MissingLink);
    }

    let mut merged = match existing {
        Some(note) => match serde_json::to_value(note) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    };
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }

    serde_json::from_value(Value::Object(merged)).map_err(|e| Rejection::Malformed(e.to_string()))
}

fn non_empty_str(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// Newest first; stable for equal dates.
pub fn sort_by_date_desc(notes: &mut [ProblemNote]) {
    notes.sort_by_key(|note| Reverse(note.timestamp_millis()));
}
