//! Shared data structures for the amognotes application.
//!
//! This module contains the result types reported by the note store and the
//! expiry engine, plus the command definitions of the CLI front end.
use std::fmt;

use clap::Subcommand;

use crate::NotesError;

/// A specialized Result type for amognotes operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// What [`crate::NoteStore::load`] found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No notes document exists yet
    Missing,
    /// The document was read; `unreadable` records are kept aside untouched
    Loaded { notes: usize, unreadable: usize },
    /// The document could not be parsed and the store was reset to empty
    Recovered { message: String },
}

/// Why the expiry engine removed a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// Temporary note older than the retention window
    TemporaryExpired,
    /// Recycle bin entry deleted longer ago than the retention window
    RecycleBinExpired,
    /// Record that is not a JSON object
    Corrupted,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemovalReason::TemporaryExpired => "temporary note expired",
            RemovalReason::RecycleBinExpired => "recycle bin retention elapsed",
            RemovalReason::Corrupted => "corrupted record",
        };
        f.write_str(label)
    }
}

/// Summary of one expiry sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Removed ids with the first reason that matched, in id order
    pub removed: Vec<(String, RemovalReason)>,
    /// Ids left untouched this cycle because their record could not be read
    pub skipped: Vec<String>,
}

impl SweepReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.skipped.is_empty()
    }
}

/// Available subcommands for the amognotes application
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new note
    Create {
        /// Title of the note
        #[clap(short = 'T', long, default_value = "")]
        title: String,

        /// Content of the note
        #[clap(short, long)]
        content: Option<String>,

        /// Category to file the note under
        #[clap(short = 'C', long)]
        category: Option<String>,

        /// Mark the note as temporary (auto-deletes after the retention window)
        #[clap(short = 't', long)]
        temporary: bool,

        /// Open content in editor before saving
        #[clap(short, long)]
        edit: bool,
    },

    /// Edit an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New title for the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New content for the note
        #[clap(short, long)]
        content: Option<String>,

        /// New category for the note
        #[clap(short = 'C', long)]
        category: Option<String>,

        /// Set or clear the temporary flag
        #[clap(short = 't', long)]
        temporary: Option<bool>,

        /// Open the current content in the editor
        #[clap(short, long)]
        edit: bool,
    },

    /// View a note by ID
    View {
        /// ID of the note to view
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// List notes in one of the views: all, favorites, temporary, bin, category:<name>
    List {
        /// View selector
        #[clap(short, long, default_value = "all")]
        filter: String,

        /// Limit the number of notes returned (0 shows everything)
        #[clap(short = 'n', long, default_value_t = 0)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Toggle the favorite flag of a note
    Favorite {
        /// ID of the note
        id: String,
    },

    /// Move a note to the recycle bin, or delete it permanently
    Delete {
        /// ID of the note to delete
        id: String,

        /// Remove the note for good instead of moving it to the recycle bin
        #[clap(short, long)]
        permanent: bool,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Restore a note from the recycle bin
    Restore {
        /// ID of the note to restore
        id: String,
    },

    /// Move a note to another category
    Move {
        /// ID of the note
        id: String,

        /// Target category
        category: String,
    },

    /// Category operations (list, rename, delete)
    #[clap(subcommand)]
    Category(CategoryCommands),

    /// Run the expiry sweep now
    Sweep,

    /// Show or update settings
    Settings {
        /// Theme: light, dark or amoled
        #[clap(long)]
        theme: Option<String>,

        /// Accent color as #RRGGBB
        #[clap(long)]
        accent: Option<String>,

        /// Enable or disable joke notes
        #[clap(long)]
        jokes: Option<bool>,

        /// Companion image file name, empty to disable
        #[clap(long)]
        buddy: Option<String>,
    },

    /// Keep running and perform periodic maintenance until interrupted
    Watch,
}

/// Category subcommands
#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    /// List categories with their note counts
    List,

    /// Declare an empty category for this session
    Add {
        /// Category name
        name: String,
    },

    /// Rename a category on every member note
    Rename {
        /// Current name
        old: String,

        /// New name
        new: String,
    },

    /// Delete a category, moving its notes to Uncategorized
    Delete {
        /// Category name
        name: String,
    },
}

