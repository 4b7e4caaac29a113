//! Category registry derived from the live notes.
//!
//! Categories are not stored anywhere on their own: a name exists while at
//! least one non-deleted note uses it. Names declared by the user before any
//! note uses them are kept as session-only drafts.
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::{normalize_category, Note, NoteStore, NotesError, Result, DEFAULT_CATEGORY};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryRegistry {
    /// Live note count per category, Uncategorized excluded
    counts: BTreeMap<String, usize>,

    /// Declared names no live note uses yet
    drafts: BTreeSet<String>,
}

impl CategoryRegistry {
    /// Builds the registry from a set of notes.
    pub fn from_notes<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Self {
        let mut registry = Self::default();
        registry.recount(notes);
        registry
    }

    pub fn from_store(store: &NoteStore) -> Self {
        Self::from_notes(store.notes())
    }

    /// Recomputes the registry after the store changed. Drafts that gained a
    /// note become regular categories.
    pub fn refresh(&mut self, store: &NoteStore) {
        self.recount(store.notes());
    }

    fn recount<'a>(&mut self, notes: impl IntoIterator<Item = &'a Note>) {
        self.counts.clear();
        for note in notes {
            if note.deleted || note.category == DEFAULT_CATEGORY {
                continue;
            }
            *self.counts.entry(note.category.clone()).or_insert(0) += 1;
        }

        let counts = &self.counts;
        self.drafts.retain(|name| !counts.contains_key(name));
        debug!("Category registry holds {} categories", self.counts.len());
    }

    /// Categories used by live notes, sorted ascending.
    pub fn names(&self) -> Vec<&str> {
        self.counts.keys().map(String::as_str).collect()
    }

    /// Live note count for `name`, zero when unknown.
    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counts.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Session-only categories without notes.
    pub fn drafts(&self) -> Vec<&str> {
        self.drafts.iter().map(String::as_str).collect()
    }

    /// Everything a category picker should offer: used names plus drafts.
    pub fn listing(&self) -> Vec<&str> {
        let merged: BTreeSet<&str> = self
            .counts
            .keys()
            .chain(self.drafts.iter())
            .map(String::as_str)
            .collect();
        merged.into_iter().collect()
    }

    /// Declares a new category before any note uses it.
    pub fn declare(&mut self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() || name == DEFAULT_CATEGORY {
            return Err(NotesError::validation("Please enter a category name."));
        }
        if self.counts.contains_key(name) || self.drafts.contains(name) {
            return Err(NotesError::validation(format!(
                "Category '{}' already exists.",
                name
            )));
        }

        info!("Declared category '{}'", name);
        self.drafts.insert(name.to_string());
        Ok(name.to_string())
    }

    /// Renames `old` to `new` on every member note and in the registry.
    /// Returns the number of notes rewritten. Blank or unchanged names do nothing.
    pub fn rename(&mut self, store: &mut NoteStore, old: &str, new: &str) -> Result<usize> {
        if old == DEFAULT_CATEGORY {
            return Err(NotesError::validation(format!(
                "'{}' cannot be renamed",
                DEFAULT_CATEGORY
            )));
        }

        let new = new.trim();
        if new.is_empty() || new == old {
            debug!("Ignoring rename of '{}' to '{}'", old, new);
            return Ok(0);
        }

        let was_draft = self.drafts.remove(old);
        let touched = store.rename_category(old, new)?;
        if was_draft && touched == 0 && new != DEFAULT_CATEGORY {
            self.drafts.insert(new.to_string());
        }

        self.refresh(store);
        Ok(touched)
    }

    /// Moves every member of `name` to Uncategorized and forgets the name.
    /// Notes are never deleted.
    pub fn delete(&mut self, store: &mut NoteStore, name: &str) -> Result<usize> {
        let name = normalize_category(name);
        if name == DEFAULT_CATEGORY {
            return Err(NotesError::validation(format!(
                "'{}' cannot be deleted",
                DEFAULT_CATEGORY
            )));
        }

        self.drafts.remove(&name);
        let touched = store.delete_category(&name)?;
        self.refresh(store);
        Ok(touched)
    }
}
