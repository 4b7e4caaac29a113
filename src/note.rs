//! Core note record for the amognotes application.
//!
//! A [`Note`] is stored inside the notes document keyed by its id, so the id
//! itself is not part of the serialized object.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Category assigned to notes that have not been filed anywhere.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Layout of generated note ids: UTC timestamp with microsecond resolution.
pub const ID_FORMAT: &str = "%Y%m%d%H%M%S%6f";

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for the note, the key in the notes document
    #[serde(skip)]
    pub id: String,
    /// Note title
    #[serde(default)]
    pub title: String,
    /// Note body
    #[serde(default)]
    pub content: String,
    /// When the note was created
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last modification of title, content, category or the temporary flag
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Category label, never empty
    #[serde(default = "default_category", deserialize_with = "category_or_default")]
    pub category: String,
    #[serde(default)]
    pub favorite: bool,
    /// Temporary notes are hard deleted once they are older than the retention window
    #[serde(default)]
    pub temporary: bool,
    /// Recycle bin membership
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, with = "timestamp::option")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Creates a fresh note with `created_at == updated_at == now`
    pub fn new(id: String, title: String, content: String, now: DateTime<Utc>) -> Self {
        Note {
            id,
            title,
            content,
            created_at: now,
            updated_at: now,
            category: DEFAULT_CATEGORY.to_string(),
            favorite: false,
            temporary: false,
            deleted: false,
            deleted_at: None,
        }
    }

    /// Whether the note has neither title nor content.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }

    /// Title to show when the note has none.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }
}

/// Field values for [`crate::NoteStore::upsert`].
///
/// Title and content always replace the stored values. Every `Option` left as
/// `None` keeps what the existing note has (or the default for a new note).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteFields {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub temporary: Option<bool>,
    pub favorite: Option<bool>,
    pub deleted: Option<bool>,
}

impl NoteFields {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        NoteFields {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = Some(temporary);
        self
    }

    pub fn favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// Upserting blank fields is a no-op.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }
}

/// Maps a blank category name onto [`DEFAULT_CATEGORY`].
pub fn normalize_category(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Timestamp-derived id candidate for a note created at `now`.
pub fn generate_id(now: DateTime<Utc>) -> String {
    now.format(ID_FORMAT).to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn category_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|name| normalize_category(&name))
        .unwrap_or_else(default_category))
}

/// Serde helpers for note timestamps.
///
/// Writes RFC 3339 in UTC. Reads RFC 3339 as well as naive ISO-8601 values
/// without an offset, which are taken as local time.
pub mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }

        let naive = NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }

    pub fn render(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&render(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&super::render(value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
            }
        }
    }
}
