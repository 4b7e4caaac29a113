use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use serde_json::Value;

use crate::{
    generate_id, normalize_category, read_json_document, write_json_atomic, Filter, LoadOutcome,
    Note, NoteFields, NotesError, Result, DEFAULT_CATEGORY,
};

/// Owns every note record and persists them as a single JSON object.
///
/// All mutating methods write the full document back to disk when they change
/// something. If that write fails the error is returned, but the in-memory
/// change is kept and will be written by the next successful save.
#[derive(Debug)]
pub struct NoteStore {
    /// Location of the notes document
    path: PathBuf,

    /// Notes indexed by id
    notes: BTreeMap<String, Note>,

    /// Records that could not be read as notes, written back verbatim
    unreadable: BTreeMap<String, Value>,

    /// Last id handed out by this store, keeps ids increasing within a session
    last_issued_id: Option<u128>,
}

impl NoteStore {
    /// Creates an empty store backed by `path`. Nothing is read until [`NoteStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            notes: BTreeMap::new(),
            unreadable: BTreeMap::new(),
            last_issued_id: None,
        }
    }

    /// Creates a store and loads the document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, LoadOutcome)> {
        let mut store = Self::new(path);
        let outcome = store.load()?;
        Ok((store, outcome))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the in-memory state with the persisted document.
    ///
    /// A document that cannot be parsed resets the store to empty and is
    /// reported as [`LoadOutcome::Recovered`]. Individual records that are not
    /// valid notes are kept aside so the expiry sweep can deal with them.
    pub fn load(&mut self) -> Result<LoadOutcome> {
        self.notes.clear();
        self.unreadable.clear();

        let document = match read_json_document(&self.path) {
            Ok(Some(document)) => document,
            Ok(None) => {
                info!("No notes document at {}, starting empty", self.path.display());
                return Ok(LoadOutcome::Missing);
            }
            Err(NotesError::Serialization(e)) => {
                let message = format!(
                    "Could not load {}. File might be corrupted: {}",
                    self.path.display(),
                    e
                );
                warn!("{}", message);
                return Ok(LoadOutcome::Recovered { message });
            }
            Err(e) => return Err(e),
        };

        let records = match document {
            Value::Object(records) => records,
            other => {
                let message = format!(
                    "Notes document {} is not a JSON object (found {})",
                    self.path.display(),
                    json_kind(&other)
                );
                warn!("{}", message);
                return Ok(LoadOutcome::Recovered { message });
            }
        };

        let now = Utc::now();
        for (id, record) in records {
            if !record.is_object() {
                warn!("Corrupted note data found for ID {}", id);
                self.unreadable.insert(id, record);
                continue;
            }

            match serde_json::from_value::<Note>(record.clone()) {
                Ok(mut note) => {
                    note.id = id.clone();
                    repair_deletion_state(&mut note, now);
                    self.notes.insert(id, note);
                }
                Err(e) => {
                    warn!("Could not read note {}: {}", id, e);
                    self.unreadable.insert(id, record);
                }
            }
        }

        info!(
            "Loaded {} notes ({} unreadable) from {}",
            self.notes.len(),
            self.unreadable.len(),
            self.path.display()
        );

        Ok(LoadOutcome::Loaded {
            notes: self.notes.len(),
            unreadable: self.unreadable.len(),
        })
    }

    /// Writes the full mapping, including unreadable records, to disk.
    pub fn save(&self) -> Result<()> {
        debug!("Saving {} notes to {}", self.notes.len(), self.path.display());

        let mut document: BTreeMap<&str, Value> = BTreeMap::new();
        for (id, note) in &self.notes {
            document.insert(id.as_str(), serde_json::to_value(note)?);
        }
        for (id, record) in &self.unreadable {
            document.insert(id.as_str(), record.clone());
        }

        write_json_atomic(&self.path, &document).map_err(|e| {
            error!("Could not save notes to {}: {}", self.path.display(), e);
            e
        })
    }

    /// Retrieves a note by its ID
    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.notes.contains_key(id)
    }

    /// All readable notes in id order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Records kept aside because they could not be read as notes.
    pub fn unreadable(&self) -> &BTreeMap<String, Value> {
        &self.unreadable
    }

    /// Notes visible under `filter`, newest update first.
    pub fn view(&self, filter: &Filter) -> Vec<&Note> {
        crate::project(self.notes.values(), filter)
    }

    /// Creates or edits a note. See [`NoteStore::upsert_at`].
    pub fn upsert(&mut self, id: Option<&str>, fields: NoteFields) -> Result<Option<String>> {
        self.upsert_at(id, fields, Utc::now())
    }

    /// Creates a note (no id) or replaces the editable fields of an existing one.
    ///
    /// `created_at`, `favorite`, `temporary`, `category` and the deletion state
    /// are carried over from the existing note unless `fields` overrides them.
    /// `updated_at` is always set to `now`. Blank fields are a no-op and
    /// return `None`.
    pub fn upsert_at(
        &mut self,
        id: Option<&str>,
        fields: NoteFields,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        if fields.is_blank() {
            debug!("Discarding note with empty title and content");
            return Ok(None);
        }

        let id = match id {
            Some(id) => id.to_string(),
            None => self.allocate_id(now),
        };

        let existing = self.notes.get(&id);
        let was_deleted = existing.is_some_and(|note| note.deleted);
        let deleted = fields.deleted.unwrap_or(was_deleted);
        let deleted_at = match (deleted, was_deleted) {
            (false, _) => None,
            (true, true) => existing.and_then(|note| note.deleted_at).or(Some(now)),
            (true, false) => Some(now),
        };

        let note = Note {
            id: id.clone(),
            title: fields.title,
            content: fields.content,
            created_at: existing.map_or(now, |note| note.created_at),
            updated_at: now,
            category: fields
                .category
                .as_deref()
                .map(normalize_category)
                .or_else(|| existing.map(|note| note.category.clone()))
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            favorite: fields
                .favorite
                .or_else(|| existing.map(|note| note.favorite))
                .unwrap_or(false),
            temporary: fields
                .temporary
                .or_else(|| existing.map(|note| note.temporary))
                .unwrap_or(false),
            deleted,
            deleted_at,
        };

        let created = existing.is_none();
        self.unreadable.remove(&id);
        self.notes.insert(id.clone(), note);

        if created {
            info!("Created note {}", id);
        } else {
            info!("Updated note {}", id);
        }

        self.save()?;
        Ok(Some(id))
    }

    /// Flips `favorite`. Leaves `updated_at` alone. Returns whether the note exists.
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        let Some(note) = self.notes.get_mut(id) else {
            debug!("toggle_favorite: unknown note {}", id);
            return Ok(false);
        };

        note.favorite = !note.favorite;
        trace!("Note {} favorite = {}", id, note.favorite);
        self.save()?;
        Ok(true)
    }

    /// Moves a note to the recycle bin.
    pub fn soft_delete(&mut self, id: &str) -> Result<bool> {
        self.soft_delete_at(id, Utc::now())
    }

    /// Moves a note to the recycle bin, stamping `deleted_at` with `now`.
    pub fn soft_delete_at(&mut self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let Some(note) = self.notes.get_mut(id) else {
            debug!("soft_delete: unknown note {}", id);
            return Ok(false);
        };

        note.deleted = true;
        note.deleted_at = Some(now);
        info!("Moved note {} to the recycle bin", id);
        self.save()?;
        Ok(true)
    }

    /// Takes a note out of the recycle bin.
    pub fn restore(&mut self, id: &str) -> Result<bool> {
        let Some(note) = self.notes.get_mut(id) else {
            debug!("restore: unknown note {}", id);
            return Ok(false);
        };

        note.deleted = false;
        note.deleted_at = None;
        info!("Restored note {}", id);
        self.save()?;
        Ok(true)
    }

    /// Removes a note for good.
    pub fn hard_delete(&mut self, id: &str) -> Result<bool> {
        if self.notes.remove(id).is_none() {
            debug!("hard_delete: unknown note {}", id);
            return Ok(false);
        }

        info!("Permanently deleted note {}", id);
        self.save()?;
        Ok(true)
    }

    /// Files a note under `category`. A blank name means Uncategorized.
    pub fn change_category(&mut self, id: &str, category: &str) -> Result<bool> {
        self.change_category_at(id, category, Utc::now())
    }

    pub fn change_category_at(
        &mut self,
        id: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(note) = self.notes.get_mut(id) else {
            debug!("change_category: unknown note {}", id);
            return Ok(false);
        };

        note.category = normalize_category(category);
        note.updated_at = now;
        info!("Note {} moved to category '{}'", id, note.category);
        self.save()?;
        Ok(true)
    }

    /// Rewrites `category` on every note filed under `old`, recycle bin included.
    /// Returns the number of notes touched.
    pub fn rename_category(&mut self, old: &str, new: &str) -> Result<usize> {
        self.rename_category_at(old, new, Utc::now())
    }

    /// Like [`NoteStore::change_category_at`], every note touched gets
    /// `updated_at = now`.
    pub fn rename_category_at(
        &mut self,
        old: &str,
        new: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let new = normalize_category(new);
        let mut touched = 0;
        for note in self.notes.values_mut().filter(|note| note.category == old) {
            note.category = new.clone();
            note.updated_at = now;
            touched += 1;
        }

        info!("Renamed category '{}' to '{}' on {} notes", old, new, touched);
        if touched > 0 {
            self.save()?;
        }
        Ok(touched)
    }

    /// Moves every note filed under `name` back to Uncategorized.
    pub fn delete_category(&mut self, name: &str) -> Result<usize> {
        self.delete_category_at(name, Utc::now())
    }

    pub fn delete_category_at(&mut self, name: &str, now: DateTime<Utc>) -> Result<usize> {
        self.rename_category_at(name, DEFAULT_CATEGORY, now)
    }

    /// Drops the given ids from both readable and unreadable records without
    /// saving. Returns how many records were removed.
    pub(crate) fn purge<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>) -> usize {
        let mut removed = 0;
        for id in ids {
            let found = self.notes.remove(id).is_some() | self.unreadable.remove(id).is_some();
            if found {
                removed += 1;
            }
        }
        removed
    }

    /// Hands out a timestamp-derived id that is unused and larger than any id
    /// this store issued before.
    fn allocate_id(&mut self, now: DateTime<Utc>) -> String {
        let mut candidate: u128 = generate_id(now).parse().unwrap_or_default();
        if let Some(last) = self.last_issued_id {
            if candidate <= last {
                candidate = last + 1;
            }
        }

        let mut id = format!("{:020}", candidate);
        while self.notes.contains_key(&id) || self.unreadable.contains_key(&id) {
            candidate += 1;
            id = format!("{:020}", candidate);
        }

        self.last_issued_id = Some(candidate);
        id
    }
}

/// Keeps `deleted` and `deleted_at` consistent for records written by older
/// versions: a bin entry without a date is dated `now`, a live note loses its date.
fn repair_deletion_state(note: &mut Note, now: DateTime<Utc>) {
    match (note.deleted, note.deleted_at) {
        (true, None) => {
            warn!("Note {} is in the recycle bin without a deletion date", note.id);
            note.deleted_at = Some(now);
        }
        (false, Some(_)) => {
            debug!("Clearing stale deletion date on note {}", note.id);
            note.deleted_at = None;
        }
        _ => {}
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
