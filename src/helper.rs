use std::{
    fs,
    io::{ErrorKind, Write},
    path::Path,
};

use log::{debug, error, trace};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{NotesError, Result};

/// Reads a JSON document, returning `None` when the file does not exist.
///
/// Parse failures, including bytes that are not valid UTF-8, are returned as
/// [`NotesError::Serialization`] so callers can decide how to recover.
pub fn read_json_document(path: &Path) -> Result<Option<Value>> {
    debug!("Reading JSON document: {}", path.display());
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            trace!("Document {} does not exist", path.display());
            return Ok(None);
        }
        Err(e) => {
            error!("Failed to open document {}: {}", path.display(), e);
            return Err(NotesError::Io(e));
        }
    };

    let value = serde_json::from_slice(&bytes)?;
    Ok(Some(value))
}

/// Writes `value` as pretty JSON using a temp file in the same directory
/// followed by an atomic rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !dir.exists() {
        debug!("Creating parent directory: {}", dir.display());
        fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create directory {}: {}", dir.display(), e);
            NotesError::DirectoryError {
                path: dir.to_path_buf(),
            }
        })?;
    }

    trace!("Serializing document for {}", path.display());
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        error!("Failed to serialize document: {}", e);
        NotesError::Serialization(e)
    })?;

    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        error!("Failed to create temporary file: {}", e);
        NotesError::Io(e)
    })?;

    temp_file.write_all(json.as_bytes()).map_err(|e| {
        error!("Failed to write to temporary file: {}", e);
        NotesError::Io(e)
    })?;

    temp_file.flush().map_err(|e| {
        error!("Failed to flush temporary file: {}", e);
        NotesError::Io(e)
    })?;

    temp_file.persist(path).map_err(|e| {
        error!("Failed to persist file {}: {}", path.display(), e.error);
        NotesError::Io(e.error)
    })?;

    trace!("Document written to {}", path.display());
    Ok(())
}

/// First non-empty line of `content`, cut to `max_chars` characters.
pub fn content_preview(content: &str, max_chars: usize) -> String {
    let first_line = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
        .trim();

    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Drops editor comment lines (`<!-- ... -->`) from text returned by the editor.
pub fn strip_editor_comments(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            !line.trim_start().starts_with("<!--") && !line.trim_end().ends_with("-->")
        })
        .collect::<Vec<&str>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_document_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let doc = read_json_document(&dir.path().join("nope.json")).unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn test_atomic_write_creates_parent_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        let value = json!({"a": 1, "b": [true, null]});

        write_json_atomic(&path, &value).unwrap();
        assert_eq!(read_json_document(&path).unwrap(), Some(value));
    }

    #[test]
    fn test_garbage_document_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            read_json_document(&path),
            Err(NotesError::Serialization(_))
        ));
    }

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("\n\n  hello world  \nsecond", 50), "hello world");
        assert_eq!(content_preview("abcdef", 3), "abc...");
        assert_eq!(content_preview("", 10), "");
    }

    #[test]
    fn test_strip_editor_comments() {
        let raw = "<!-- Write below -->\nline one\n<!--\nnote\n-->\nline two\n";
        assert_eq!(strip_editor_comments(raw), "line one\nnote\nline two");
    }
}
