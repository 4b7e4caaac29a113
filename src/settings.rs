//! User settings persisted next to the notes.
//!
//! Settings are loaded into a plain [`Settings`] value and passed to whoever
//! needs them. Loading never fails: a broken document falls back to defaults.
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::{read_json_document, write_json_atomic, Config, NotesError, Result};

pub const DEFAULT_ACCENT_COLOR: &str = "#FF69B4";

/// Accent colors offered by the settings screen.
pub const ACCENT_PRESETS: [(&str, &str); 6] = [
    ("AmogOS Pink", "#FF69B4"),
    ("Sunset Orange", "#FF8C00"),
    ("Forest Green", "#228B22"),
    ("Ocean Blue", "#1E90FF"),
    ("Royal Purple", "#8A2BE2"),
    ("Graphite Gray", "#696969"),
];

/// Image types accepted as companion assets.
const BUDDY_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "svg", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Amoled,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Light, Theme::Dark, Theme::Amoled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Amoled => "amoled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Theme::Light => "Light Mode",
            Theme::Dark => "Dark Mode",
            Theme::Amoled => "AMOLED Dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = NotesError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "amoled" => Ok(Theme::Amoled),
            other => Err(NotesError::validation(format!(
                "unknown theme '{}', expected light, dark or amoled",
                other
            ))),
        }
    }
}

// Stored themes are read leniently: the legacy "auto" value and anything
// unknown become the default theme.
impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(raw.parse().unwrap_or_else(|_| {
            if raw != "auto" {
                warn!("Unknown theme '{}' in settings, using default", raw);
            }
            Theme::default()
        }))
    }
}

/// Persisted user preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Accent color as `#RRGGBB`
    pub accent_color: String,
    pub theme: Theme,
    /// Whether the joke generator may inject notes
    pub amogus_jokes: bool,
    /// Companion asset file name, empty for none
    pub buddy: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
            theme: Theme::default(),
            amogus_jokes: true,
            buddy: String::new(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !is_hex_color(&self.accent_color) {
            return Err(NotesError::validation(format!(
                "accent color '{}' is not a #RRGGBB value",
                self.accent_color
            )));
        }
        if self.buddy.contains(['/', '\\']) {
            return Err(NotesError::validation(format!(
                "companion '{}' must be a file name, not a path",
                self.buddy
            )));
        }
        Ok(())
    }

    /// Name of the preset matching the accent color, if any.
    pub fn accent_name(&self) -> Option<&'static str> {
        ACCENT_PRESETS
            .iter()
            .find(|(_, hex)| hex.eq_ignore_ascii_case(&self.accent_color))
            .map(|(name, _)| *name)
    }
}

/// Whether `value` looks like `#RRGGBB`.
pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Reads and writes the settings document.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    buddies_dir: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, buddies_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            buddies_dir: buddies_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.settings_path(), config.buddies_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings, falling back to defaults for a missing or broken document.
    pub fn load(&self) -> Settings {
        let document = match read_json_document(&self.path) {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!("No settings at {}, using defaults", self.path.display());
                return Settings::default();
            }
            Err(e) => {
                warn!(
                    "Error decoding {}: {}. Using default settings.",
                    self.path.display(),
                    e
                );
                return Settings::default();
            }
        };

        let mut settings: Settings = match serde_json::from_value(document) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "Invalid settings in {}: {}. Using default settings.",
                    self.path.display(),
                    e
                );
                return Settings::default();
            }
        };

        if !is_hex_color(&settings.accent_color) {
            warn!(
                "Invalid accent color '{}', using default",
                settings.accent_color
            );
            settings.accent_color = DEFAULT_ACCENT_COLOR.to_string();
        }

        debug!(
            "Loaded settings: theme={}, accent={}",
            settings.theme, settings.accent_color
        );
        settings
    }

    /// Writes `settings`, keeping keys of the existing document it does not know about.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;

        let mut document = match read_json_document(&self.path) {
            Ok(Some(Value::Object(existing))) => existing,
            Ok(_) => Map::new(),
            Err(e) => {
                debug!("Overwriting unreadable settings document: {}", e);
                Map::new()
            }
        };

        if let Value::Object(fields) = serde_json::to_value(settings)? {
            document.extend(fields);
        }

        write_json_atomic(&self.path, &document)?;
        info!("Settings saved to {}", self.path.display());
        Ok(())
    }

    /// Loads, applies `change`, validates and saves. Returns the saved settings.
    pub fn update(&self, change: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut settings = self.load();
        change(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }

    /// Companion images available in the buddies directory, sorted by name.
    pub fn available_buddies(&self) -> Vec<String> {
        if !self.buddies_dir.exists() {
            return Vec::new();
        }

        let mut buddies: Vec<String> = WalkDir::new(&self.buddies_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| BUDDY_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            })
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();

        buddies.sort();
        buddies
    }
}
