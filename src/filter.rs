//! View selection over the note collection.
//!
//! A [`Filter`] picks one partition of the notes (all, favorites, temporary,
//! one category, or the recycle bin) and [`project`] returns that partition
//! ordered by most recent update.
use std::{fmt, str::FromStr};

use crate::{Note, NotesError};

/// Note views offered by the application
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    All,
    Favorites,
    Temporary,
    Category(String),
    RecycleBin,
}

impl Filter {
    /// Whether `note` belongs to this view.
    pub fn matches(&self, note: &Note) -> bool {
        match self {
            Filter::All => !note.deleted,
            Filter::Favorites => note.favorite && !note.deleted,
            Filter::Temporary => note.temporary && !note.deleted,
            Filter::Category(name) => note.category == *name && !note.deleted,
            Filter::RecycleBin => note.deleted,
        }
    }

    /// Heading for the view.
    pub fn title(&self) -> String {
        match self {
            Filter::All => "All Notes".to_string(),
            Filter::Favorites => "Favorites".to_string(),
            Filter::Temporary => "Temporary Notes".to_string(),
            Filter::Category(name) => name.clone(),
            Filter::RecycleBin => "Recycle Bin".to_string(),
        }
    }

    /// Hint shown when the view has no notes.
    pub fn empty_hint(&self) -> Option<String> {
        match self {
            Filter::RecycleBin => Some("Deleted notes will appear here.".to_string()),
            Filter::Category(name) => Some(format!(
                "No notes in the '{}' category. Create a new note or move existing notes here.",
                name
            )),
            Filter::Favorites => None,
            Filter::All | Filter::Temporary => {
                Some("Use 'create' to add a new one.".to_string())
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str("all"),
            Filter::Favorites => f.write_str("favorites"),
            Filter::Temporary => f.write_str("temporary"),
            Filter::Category(name) => write!(f, "category:{}", name),
            Filter::RecycleBin => f.write_str("recycle-bin"),
        }
    }
}

impl FromStr for Filter {
    type Err = NotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("category:") {
            let name = name.trim();
            if name.is_empty() {
                return Err(NotesError::validation("category filter needs a name"));
            }
            return Ok(Filter::Category(name.to_string()));
        }

        match s.trim().to_lowercase().as_str() {
            "all" | "home" => Ok(Filter::All),
            "favorites" | "favourites" | "fav" => Ok(Filter::Favorites),
            "temporary" | "temp" => Ok(Filter::Temporary),
            "recycle-bin" | "recycle_bin" | "bin" | "trash" => Ok(Filter::RecycleBin),
            other => Err(NotesError::validation(format!(
                "unknown view '{}', expected all, favorites, temporary, bin or category:<name>",
                other
            ))),
        }
    }
}

/// Notes matching `filter`, sorted by `updated_at` descending. Equal
/// timestamps fall back to id descending, which puts newer notes first.
pub fn project<'a>(notes: impl IntoIterator<Item = &'a Note>, filter: &Filter) -> Vec<&'a Note> {
    let mut visible: Vec<&Note> = notes.into_iter().filter(|note| filter.matches(note)).collect();
    visible.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    visible
}
