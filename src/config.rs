use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use which::which;

use crate::{ExpiryPolicy, NotesError, Result, DEFAULT_JOKE_PROBABILITY, DEFAULT_RETENTION_DAYS};

const NOTES_FILE: &str = "notes.json";
const SETTINGS_FILE: &str = "settings.json";
const BUDDIES_DIR: &str = "buddies";
/// Upper bound on `retention_days`, roughly a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the notes and settings documents
    pub data_dir: PathBuf,

    /// Days before temporary notes and recycle bin entries are purged
    pub retention_days: i64,

    /// How often the background sweep runs (in seconds)
    pub sweep_interval_secs: u64,

    /// Chance that one joke timer firing creates a note
    pub joke_probability: f64,

    /// Lower bound of the random delay between joke rolls (in seconds)
    pub joke_interval_min_secs: u64,

    /// Upper bound of the random delay between joke rolls (in seconds)
    pub joke_interval_max_secs: u64,

    /// Editor used by `create --edit` and `edit --edit`
    pub editor_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            retention_days: DEFAULT_RETENTION_DAYS,
            sweep_interval_secs: 300,
            joke_probability: DEFAULT_JOKE_PROBABILITY,
            joke_interval_min_secs: 600,
            joke_interval_max_secs: 3600,
            editor_command: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    match ProjectDirs::from("", "", "amognotes") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => {
            debug!("No home directory found, using ./amognotes-data");
            PathBuf::from("amognotes-data")
        }
    }
}

impl Config {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| NotesError::ConfigError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| NotesError::ConfigError {
            message: format!("invalid config {}: {}", path.display(), e),
        })?;
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            return Err(NotesError::ConfigError {
                message: format!(
                    "retention_days must be between 1 and {}, got {}",
                    MAX_RETENTION_DAYS, self.retention_days
                ),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(NotesError::ConfigError {
                message: "sweep_interval_secs must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.joke_probability) {
            return Err(NotesError::ConfigError {
                message: format!(
                    "joke_probability must be between 0 and 1, got {}",
                    self.joke_probability
                ),
            });
        }
        if self.joke_interval_min_secs > self.joke_interval_max_secs {
            return Err(NotesError::ConfigError {
                message: format!(
                    "joke interval is inverted: {}s > {}s",
                    self.joke_interval_min_secs, self.joke_interval_max_secs
                ),
            });
        }
        Ok(())
    }

    pub fn notes_path(&self) -> PathBuf {
        self.data_dir.join(NOTES_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn buddies_dir(&self) -> PathBuf {
        self.data_dir.join(BUDDIES_DIR)
    }

    /// Creates the data directory if needed.
    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|_| NotesError::DirectoryError {
            path: self.data_dir.clone(),
        })
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(self.retention_days)
    }

    // Configured editor first, then $EDITOR, then a platform default.
    pub fn get_editor_command(&self) -> String {
        if let Some(editor) = &self.editor_command {
            return editor.clone();
        }

        if let Ok(editor) = std::env::var("EDITOR") {
            if !editor.trim().is_empty() {
                return editor;
            }
        }

        if cfg!(windows) {
            "notepad".to_string()
        } else if cfg!(target_os = "macos") {
            "open -W -t".to_string()
        } else {
            for editor in &["nano", "vim", "vi", "emacs"] {
                if which(editor).is_ok() {
                    return editor.to_string();
                }
            }
            "nano".to_string()
        }
    }
}
