use crate::error::{NoteError, NoteResult};
use crate::service::query::{self, FilterCriteria};
use crate::service::reconcile::{self, NotePatch};
use crate::service::resolver::Resolver;
use crate::storage::kv::KeyValueStore;
use crate::storage::note::{NoteMetadata, ProblemNote};
use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key holding the whole collection in the key-value store.
pub const PROBLEMS_KEY: &str = "problems";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Owner of the note collection. Every mutation builds the next collection,
/// persists it whole, and only then replaces the in-memory copy, so memory
/// and storage agree after every call.
pub struct NoteService {
    store: Arc<dyn KeyValueStore>,
    resolver: Resolver,
    notes: Vec<ProblemNote>,
}

impl NoteService {
    /// Load the persisted collection (empty if nothing was saved yet)
    pub async fn load(store: Arc<dyn KeyValueStore>, resolver: Resolver) -> NoteResult<Self> {
        let notes = match store.get(PROBLEMS_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .context("Stored problem collection is corrupt")?,
            None => Vec::new(),
        };
        tracing::info!(count = notes.len(), "loaded problem notes");

        Ok(NoteService {
            store,
            resolver,
            notes,
        })
    }

    /// The collection in display order
    pub fn notes(&self) -> &[ProblemNote] {
        &self.notes
    }

    pub fn get_note(&self, id: &str) -> Option<&ProblemNote> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn search(&self, criteria: &FilterCriteria) -> Vec<&ProblemNote> {
        query::filter(&self.notes, criteria)
    }

    /// Save a new problem, resolving its metadata first
    pub async fn create_note(&mut self, link: String, notes: String) -> NoteResult<ProblemNote> {
        let metadata = self.resolver.resolve(&link).await.into_metadata(&link);
        let mut note = ProblemNote::new(link, notes, metadata);
        while self.get_note(&note.id).is_some() {
            note.id = crate::storage::note::generate_id(&note.link);
        }

        let mut next = Vec::with_capacity(self.notes.len() + 1);
        next.push(note.clone());
        next.extend(self.notes.iter().cloned());
        self.commit(next).await?;

        tracing::info!(id = %note.id, resolved = note.is_resolved(), "created note");
        Ok(note)
    }

    /// Edit a note in place. Metadata is only looked up again when the link
    /// changed. Returns `None` for an unknown id.
    pub async fn update_note(&mut self, id: &str, link: String, notes: String) -> NoteResult<Option<ProblemNote>> {
        let Some(position) = self.notes.iter().position(|note| note.id == id) else {
            tracing::debug!(id, "update of unknown note ignored");
            return Ok(None);
        };

        let existing = &self.notes[position];
        let metadata = if existing.link == link {
            existing.metadata()
        } else {
            self.resolver.resolve(&link).await.into_metadata(&link)
        };
        let updated = reconcile::merge_existing(existing, NotePatch { link, notes, metadata });

        let mut next = self.notes.clone();
        next[position] = updated.clone();
        self.commit(next).await?;

        tracing::info!(id, "updated note");
        Ok(Some(updated))
    }

    /// Re-run the metadata lookup for a note without changing its link or
    /// notes.
    pub async fn refresh_metadata(&mut self, id: &str) -> NoteResult<Option<ProblemNote>> {
        let Some(position) = self.notes.iter().position(|note| note.id == id) else {
            return Ok(None);
        };

        let existing = &self.notes[position];
        let metadata: NoteMetadata = self.resolver.resolve(&existing.link).await.into_metadata(&existing.link);
        let updated = reconcile::merge_existing(
            existing,
            NotePatch {
                link: existing.link.clone(),
                notes: existing.notes.clone(),
                metadata,
            },
        );

        let mut next = self.notes.clone();
        next[position] = updated.clone();
        self.commit(next).await?;
        Ok(Some(updated))
    }

    /// Delete a note. Returns whether anything was removed.
    pub async fn delete_note(&mut self, id: &str) -> NoteResult<bool> {
        let next: Vec<ProblemNote> = self.notes.iter().filter(|note| note.id != id).cloned().collect();
        let removed = next.len() != self.notes.len();
        self.commit(next).await?;

        if removed {
            tracing::info!(id, "deleted note");
        }
        Ok(removed)
    }

    /// Serialize the whole collection
    pub fn export_all(&self) -> NoteResult<String> {
        Ok(serde_json::to_string_pretty(&self.notes)?)
    }

    /// Write a dated backup file into `dir`
    pub async fn export_to_dir(&self, dir: &Path) -> NoteResult<PathBuf> {
        let data = self.export_all()?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(backup_file_name(chrono::Local::now().date_naive()));
        tokio::fs::write(&path, data).await?;

        tracing::info!(path = %path.display(), count = self.notes.len(), "exported notes");
        Ok(path)
    }

    /// Merge a JSON array of notes into the collection. A payload that is not
    /// an array changes nothing; entries without id or link are skipped.
    pub async fn import_all(&mut self, payload: &str) -> NoteResult<ImportReport> {
        let parsed: Value = serde_json::from_str(payload)
            .map_err(|e| NoteError::ImportFormat(format!("not valid JSON: {}", e)))?;
        let Value::Array(entries) = parsed else {
            return Err(NoteError::ImportFormat("expected an array of notes".to_string()));
        };

        let mut next = self.notes.clone();
        let mut report = ImportReport::default();
        for entry in &entries {
            let position = entry
                .get("id")
                .and_then(Value::as_str)
                .and_then(|id| next.iter().position(|note| note.id == id));

            match reconcile::merge_imported(position.map(|i| &next[i]), entry) {
                Ok(merged) => {
                    match position {
                        Some(i) => next[i] = merged,
                        None => next.push(merged),
                    }
                    report.imported += 1;
                }
                Err(reason) => {
                    tracing::warn!(%reason, "skipped imported entry");
                    report.skipped += 1;
                }
            }
        }

        reconcile::sort_by_date_desc(&mut next);
        self.commit(next).await?;

        tracing::info!(imported = report.imported, skipped = report.skipped, "imported notes");
        Ok(report)
    }

    /// Read a backup file and import it
    pub async fn import_from_file(&mut self, path: &Path) -> NoteResult<ImportReport> {
        let payload = tokio::fs::read_to_string(path).await?;
        self.import_all(&payload).await
    }

    async fn commit(&mut self, next: Vec<ProblemNote>) -> NoteResult<()> {
        let raw = serde_json::to_string(&next)?;
        self.store.set(PROBLEMS_KEY, raw).await?;
        self.notes = next;
        Ok(())
    }
}

pub fn backup_file_name(date: chrono::NaiveDate) -> String {
    format!("cf-notes-backup-{}.json", date.format("%Y-%m-%d"))
}
