//! CLI module for the amognotes application
//!
//! This module handles the command-line interface for interacting with the
//! note store, the category registry and the settings.
use std::{
    fs::{read_to_string, OpenOptions},
    io::{stdin, stdout, Write},
    path::Path,
    process::Command,
    sync::Arc,
};

use chrono::{DateTime, Local, Utc};
use console::style;
use log::{info, warn};
use shell_words::split;
use tempfile::Builder;
use tokio::sync::Mutex;

use crate::{
    content_preview, lifecycle, strip_editor_comments, CategoryCommands, CategoryRegistry,
    Commands, Config, Filter, LoadOutcome, MaintenanceScheduler, Note, NoteFields, NoteStore,
    NotesError, Result, Settings, SettingsStore, Theme, ACCENT_PRESETS, DEFAULT_CATEGORY,
};

/// CLI application handler - processes commands against the note store
pub struct App {
    /// Shared with the maintenance scheduler in watch mode
    note_storage: Arc<Mutex<NoteStore>>,

    settings_store: SettingsStore,

    settings: Settings,

    categories: CategoryRegistry,

    config: Config,
}

impl App {
    pub fn new(note_storage: NoteStore, settings_store: SettingsStore, config: Config) -> Self {
        let categories = CategoryRegistry::from_store(&note_storage);
        let settings = settings_store.load();
        Self {
            note_storage: Arc::new(Mutex::new(note_storage)),
            settings_store,
            settings,
            categories,
            config,
        }
    }

    /// Loads settings and notes from the configured data directory and runs
    /// the startup sweep.
    pub fn bootstrap(config: Config) -> Result<Self> {
        config.ensure_data_dir()?;

        let (mut store, outcome) = NoteStore::open(config.notes_path())?;
        match outcome {
            LoadOutcome::Missing => info!("Starting with an empty note collection"),
            LoadOutcome::Loaded { notes, unreadable } => {
                info!("Loaded {} notes", notes);
                if unreadable > 0 {
                    warn!("{} stored notes could not be read and were left as is", unreadable);
                }
            }
            LoadOutcome::Recovered { message } => {
                eprintln!(
                    "{} could not read saved notes ({}). Starting with an empty collection.",
                    style("Warning:").yellow().bold(),
                    message
                );
            }
        }

        let report = lifecycle::sweep(&mut store, &config.expiry_policy())?;
        if report.removed_count() > 0 {
            info!("Startup sweep removed {} notes", report.removed_count());
        }

        let settings_store = SettingsStore::from_config(&config);
        Ok(Self::new(store, settings_store, config))
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Create {
                title,
                content,
                category,
                temporary,
                edit,
            } => {
                self.create_note(title, content, category, temporary, edit)
                    .await?
            }

            Commands::Edit {
                id,
                title,
                content,
                category,
                temporary,
                edit,
            } => {
                self.edit_note(&id, title, content, category, temporary, edit)
                    .await?
            }

            Commands::View { id, json } => self.view_note(&id, json).await?,

            Commands::List {
                filter,
                limit,
                json,
            } => self.list_notes(&filter, limit, json).await?,

            Commands::Favorite { id } => self.toggle_favorite(&id).await?,

            Commands::Delete {
                id,
                permanent,
                force,
            } => self.handle_delete(&id, permanent, force).await?,

            Commands::Restore { id } => self.restore_note(&id).await?,

            Commands::Move { id, category } => self.move_note(&id, &category).await?,

            Commands::Category(command) => self.handle_category(command).await?,

            Commands::Sweep => self.run_sweep().await?,

            Commands::Settings {
                theme,
                accent,
                jokes,
                buddy,
            } => self.handle_settings(theme, accent, jokes, buddy)?,

            Commands::Watch => self.watch().await?,
        }

        Ok(())
    }

    async fn create_note(
        &mut self,
        title: String,
        content: Option<String>,
        category: Option<String>,
        temporary: bool,
        open_editor: bool,
    ) -> Result<()> {
        if content.is_some() && open_editor {
            return Err(NotesError::ApplicationError {
                message: "Cannot specify both --content and --edit options".to_string(),
            });
        }

        let content = match content {
            Some(content) => content,
            None if open_editor => self.open_editor_with_content(&title, "")?,
            None => String::new(),
        };

        let mut fields = NoteFields::new(title, content).temporary(temporary);
        if let Some(category) = category {
            fields = fields.category(category);
        }

        let mut store = self.note_storage.lock().await;
        match store.upsert(None, fields)? {
            Some(id) => {
                self.categories.refresh(&store);
                println!("Note created with ID: {}", style(id).cyan());
            }
            None => println!("Nothing to save: title and content are both empty."),
        }
        Ok(())
    }

    async fn edit_note(
        &mut self,
        id: &str,
        title: Option<String>,
        content: Option<String>,
        category: Option<String>,
        temporary: Option<bool>,
        open_editor: bool,
    ) -> Result<()> {
        if content.is_some() && open_editor {
            return Err(NotesError::ApplicationError {
                message: "Cannot specify both --content and --edit options".to_string(),
            });
        }

        let mut store = self.note_storage.lock().await;
        let existing = store.get(id).cloned().ok_or_else(|| not_found(id))?;

        let title = title.unwrap_or(existing.title);
        let content = match content {
            Some(content) => content,
            None if open_editor => self.open_editor_with_content(&title, &existing.content)?,
            None => existing.content,
        };

        let mut fields = NoteFields::new(title, content);
        if let Some(category) = category {
            fields = fields.category(category);
        }
        if let Some(temporary) = temporary {
            fields = fields.temporary(temporary);
        }

        match store.upsert(Some(id), fields)? {
            Some(id) => {
                self.categories.refresh(&store);
                println!("Note {} updated successfully", id);
            }
            None => println!("Title and content are both empty, note left unchanged."),
        }
        Ok(())
    }

    async fn view_note(&self, id: &str, json: bool) -> Result<()> {
        let store = self.note_storage.lock().await;
        let note = store.get(id).ok_or_else(|| not_found(id))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&note_json(note)?)?);
            return Ok(());
        }

        println!("{}", style(note.display_title()).bold());
        println!("ID:       {}", note.id);
        println!("Category: {}", note.category);
        println!("Created:  {}", local_time(note.created_at));
        println!("Updated:  {}", local_time(note.updated_at));

        let mut flags = Vec::new();
        if note.favorite {
            flags.push("favorite".to_string());
        }
        if note.temporary {
            flags.push("temporary".to_string());
        }
        if note.deleted {
            flags.push("in recycle bin".to_string());
        }
        if let Some(countdown) = self.config.expiry_policy().countdown(note, Utc::now()) {
            flags.push(countdown.to_string());
        }
        if !flags.is_empty() {
            println!("Flags:    {}", style(flags.join(", ")).yellow());
        }

        if !note.content.is_empty() {
            println!("\n{}", note.content);
        }
        Ok(())
    }

    /// List one view of the notes
    async fn list_notes(&self, selector: &str, limit: usize, json: bool) -> Result<()> {
        let filter: Filter = selector.parse()?;
        let store = self.note_storage.lock().await;
        let mut notes = store.view(&filter);
        if limit > 0 {
            notes.truncate(limit);
        }

        if json {
            let entries = notes
                .iter()
                .map(|note| note_json(note))
                .collect::<Result<Vec<_>>>()?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        println!("{}", style(filter.title()).bold().underlined());
        if notes.is_empty() {
            println!("No notes here yet.");
            if let Some(hint) = filter.empty_hint() {
                println!("{}", style(hint).dim());
            }
            return Ok(());
        }

        self.display_notes_text(&notes);
        println!(
            "\n{} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );
        Ok(())
    }

    fn display_notes_text(&self, notes: &[&Note]) {
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);
        let policy = self.config.expiry_policy();
        let now = Utc::now();

        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let star = if note.favorite { "★ " } else { "" };
            println!("{}{}", style(star).yellow(), style(note.display_title()).bold());

            let mut meta = format!(
                "ID: {} | {} | Updated: {}",
                note.id,
                note.category,
                local_time(note.updated_at)
            );
            if let Some(countdown) = policy.countdown(note, now) {
                meta.push_str(&format!(" | {}", countdown));
            }
            println!("{}", style(meta).dim());

            let preview = content_preview(&note.content, term_width.saturating_sub(10).max(20));
            if !preview.is_empty() {
                println!("{}", preview);
            }
        }
    }

    async fn toggle_favorite(&self, id: &str) -> Result<()> {
        let mut store = self.note_storage.lock().await;
        if !store.toggle_favorite(id)? {
            return Err(not_found(id));
        }

        let favorite = store.get(id).is_some_and(|note| note.favorite);
        if favorite {
            println!("Note {} added to favorites", id);
        } else {
            println!("Note {} removed from favorites", id);
        }
        Ok(())
    }

    async fn handle_delete(&mut self, id: &str, permanent: bool, force: bool) -> Result<()> {
        let mut store = self.note_storage.lock().await;
        let note = store.get(id).ok_or_else(|| not_found(id))?;

        if !permanent {
            store.soft_delete(id)?;
            self.categories.refresh(&store);
            println!(
                "Note {} moved to the recycle bin. It will be removed for good after {} days.",
                id, self.config.retention_days
            );
            return Ok(());
        }

        if !force {
            println!("You are about to permanently delete the following note:");
            println!("ID:       {}", note.id);
            println!("Title:    {}", note.display_title());
            println!("Category: {}", note.category);
            println!("Created:  {}", local_time(note.created_at));

            let preview = content_preview(&note.content, 100);
            if !preview.is_empty() {
                println!("\nContent preview:\n{}", preview);
            }

            println!("\nThis action cannot be undone!");
            if !confirm("Delete this note? [y/N]: ")? {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        store.hard_delete(id)?;
        self.categories.refresh(&store);
        println!("Note {} permanently deleted", id);
        Ok(())
    }

    async fn restore_note(&mut self, id: &str) -> Result<()> {
        let mut store = self.note_storage.lock().await;
        if !store.restore(id)? {
            return Err(not_found(id));
        }
        self.categories.refresh(&store);
        println!("Note {} restored", id);
        Ok(())
    }

    async fn move_note(&mut self, id: &str, category: &str) -> Result<()> {
        let mut store = self.note_storage.lock().await;
        if !store.change_category(id, category)? {
            return Err(not_found(id));
        }
        self.categories.refresh(&store);

        let category = store
            .get(id)
            .map_or(DEFAULT_CATEGORY, |note| note.category.as_str());
        println!("Note {} moved to '{}'", id, category);
        Ok(())
    }

    async fn handle_category(&mut self, command: CategoryCommands) -> Result<()> {
        let mut store = self.note_storage.lock().await;
        self.categories.refresh(&store);

        match command {
            CategoryCommands::List => {
                let listing = self.categories.listing();
                if listing.is_empty() {
                    println!("No categories yet. Use 'move <id> <category>' to file a note.");
                    return Ok(());
                }
                for name in listing {
                    if self.categories.contains(name) {
                        println!(
                            "{} ({})",
                            style(name).bold(),
                            self.categories.count(name)
                        );
                    } else {
                        println!("{} {}", style(name).bold(), style("(empty)").dim());
                    }
                }
            }
            CategoryCommands::Add { name } => {
                let name = self.categories.declare(&name)?;
                println!(
                    "Category '{}' added. It is kept once a note is moved into it.",
                    name
                );
                if self.categories.drafts().len() > 1 {
                    println!("Empty categories: {}", self.categories.drafts().join(", "));
                }
            }
            CategoryCommands::Rename { old, new } => {
                if !self.categories.listing().contains(&old.as_str()) {
                    return Err(NotesError::validation(format!(
                        "Category '{}' does not exist.",
                        old
                    )));
                }
                let touched = self.categories.rename(&mut store, &old, &new)?;
                println!("Renamed '{}' to '{}' on {} notes", old, new.trim(), touched);
            }
            CategoryCommands::Delete { name } => {
                let touched = self.categories.delete(&mut store, &name)?;
                println!(
                    "Category '{}' deleted, {} notes moved to {}",
                    name, touched, DEFAULT_CATEGORY
                );
            }
        }
        Ok(())
    }

    async fn run_sweep(&mut self) -> Result<()> {
        let mut store = self.note_storage.lock().await;
        let report = lifecycle::sweep(&mut store, &self.config.expiry_policy())?;
        self.categories.refresh(&store);

        if report.removed.is_empty() {
            println!("Nothing to clean up.");
        }
        for (id, reason) in &report.removed {
            println!("Removed {} ({})", id, reason);
        }
        for id in &report.skipped {
            println!("{} {} could not be read", style("Skipped").yellow(), id);
        }
        Ok(())
    }

    fn handle_settings(
        &mut self,
        theme: Option<String>,
        accent: Option<String>,
        jokes: Option<bool>,
        buddy: Option<String>,
    ) -> Result<()> {
        let theme = theme.map(|raw| raw.parse::<Theme>()).transpose()?;

        if theme.is_some() || accent.is_some() || jokes.is_some() || buddy.is_some() {
            if let Some(buddy) = buddy.as_deref().filter(|b| !b.is_empty()) {
                if !self.settings_store.available_buddies().iter().any(|b| b == buddy) {
                    warn!("Companion '{}' not found in {}", buddy, self.config.buddies_dir().display());
                }
            }

            self.settings = self.settings_store.update(|settings| {
                if let Some(theme) = theme {
                    settings.theme = theme;
                }
                if let Some(accent) = accent {
                    settings.accent_color = accent.trim().to_uppercase();
                }
                if let Some(jokes) = jokes {
                    settings.amogus_jokes = jokes;
                }
                if let Some(buddy) = buddy {
                    settings.buddy = buddy.trim().to_string();
                }
            })?;
            println!("Settings saved.");
        }

        self.print_settings();
        Ok(())
    }

    fn print_settings(&self) {
        let settings = &self.settings;
        println!("Theme:   {} ({})", settings.theme.label(), settings.theme);
        match settings.accent_name() {
            Some(name) => println!("Accent:  {} {}", settings.accent_color, name),
            None => println!("Accent:  {} (custom)", settings.accent_color),
        }
        println!("Jokes:   {}", if settings.amogus_jokes { "on" } else { "off" });
        println!(
            "Buddy:   {}",
            if settings.buddy.is_empty() { "none" } else { settings.buddy.as_str() }
        );

        let presets = ACCENT_PRESETS
            .iter()
            .map(|(name, hex)| format!("{} {}", name, hex))
            .collect::<Vec<_>>()
            .join(", ");
        println!("\n{}", style(format!("Accent presets: {}", presets)).dim());

        let buddies = self.settings_store.available_buddies();
        if !buddies.is_empty() {
            println!("{}", style(format!("Companions: {}", buddies.join(", "))).dim());
        }
    }

    /// Starts the maintenance scheduler and blocks until Ctrl-C.
    async fn watch(&mut self) -> Result<()> {
        let mut scheduler = MaintenanceScheduler::new(self.config.clone());
        scheduler.set_storage(&self.note_storage);
        scheduler
            .set_jokes_enabled(self.settings.amogus_jokes)
            .await?;
        scheduler.start().await?;

        println!(
            "Watching {} (sweep every {}s). Press Ctrl-C to stop.",
            self.config.data_dir.display(),
            self.config.sweep_interval_secs
        );

        tokio::signal::ctrl_c().await?;
        scheduler.stop().await?;

        let status = scheduler.get_status();
        println!(
            "Stopped. Last sweep removed {} notes, {} jokes were added.",
            status.last_sweep_removed, status.jokes_injected
        );
        Ok(())
    }

    fn open_editor_with_content(&self, title: &str, existing_content: &str) -> Result<String> {
        let temp_file = Builder::new().prefix("amognote-").suffix(".txt").tempfile()?;
        let temp_path = temp_file.path().to_path_buf();

        self.write_editor_template(&temp_path, title, existing_content)?;

        let editor_cmd = self.config.get_editor_command();
        info!("Opening editor to write note content. Save and exit when done...");
        launch_editor(&editor_cmd, &temp_path)?;

        let content = read_to_string(&temp_path)?;
        Ok(strip_editor_comments(&content))
    }

    fn write_editor_template(&self, path: &Path, title: &str, existing_content: &str) -> Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;

        writeln!(file, "<!-- ")?;
        writeln!(file, "Editing: {}", if title.is_empty() { "Untitled" } else { title })?;
        writeln!(
            file,
            "Lines that start with <!-- and end with --> are comments and will be ignored."
        )?;
        writeln!(file, "Save and exit the editor when you're done.")?;
        writeln!(file, "-->")?;
        write!(file, "{}", existing_content)?;

        Ok(())
    }
}

fn launch_editor(editor_cmd: &str, file_path: &Path) -> Result<()> {
    let args = split(editor_cmd).map_err(|e| NotesError::EditorError {
        message: format!("Failed to parse editor command: {}", e),
    })?;

    let Some((program, rest)) = args.split_first() else {
        return Err(NotesError::EditorError {
            message: "Empty editor command".to_string(),
        });
    };

    let status = Command::new(program)
        .args(rest)
        .arg(file_path.as_os_str())
        .status()?;

    if !status.success() {
        return Err(NotesError::EditorError {
            message: "Editor exited with non-zero status".to_string(),
        });
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    stdout().flush()?;

    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn not_found(id: &str) -> NotesError {
    NotesError::NoteNotFound { id: id.to_string() }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// The stored record with its id, for `--json` output.
fn note_json(note: &Note) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(note)?;
    if let serde_json::Value::Object(fields) = &mut value {
        fields.insert("id".to_string(), serde_json::Value::String(note.id.clone()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_app(dir: &TempDir) -> App {
        let config = Config {
            editor_command: Some("true".to_string()),
            ..Config::default().with_data_dir(dir.path())
        };
        App::bootstrap(config).unwrap()
    }

    async fn only_note(app: &App) -> Note {
        let store = app.note_storage.lock().await;
        assert_eq!(store.len(), 1);
        let note = store.notes().next().cloned().unwrap();
        note
    }

    #[tokio::test]
    async fn test_create_then_move_and_list_categories() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        app.run(Commands::Create {
            title: "Groceries".into(),
            content: Some("eggs".into()),
            category: None,
            temporary: true,
            edit: false,
        })
        .await
        .unwrap();

        let note = only_note(&app).await;
        assert_eq!(note.category, DEFAULT_CATEGORY);
        assert!(note.temporary);

        app.run(Commands::Move {
            id: note.id.clone(),
            category: "Errands".into(),
        })
        .await
        .unwrap();
        assert_eq!(app.categories.names(), vec!["Errands"]);
    }

    #[tokio::test]
    async fn test_added_category_is_listed_until_used() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        app.run(Commands::Category(CategoryCommands::Add {
            name: " Reading ".into(),
        }))
        .await
        .unwrap();
        assert_eq!(app.categories.drafts(), vec!["Reading"]);
        assert_eq!(app.categories.listing(), vec!["Reading"]);
        assert!(app.categories.names().is_empty());
        app.run(Commands::Category(CategoryCommands::List))
            .await
            .unwrap();

        let duplicate = app
            .run(Commands::Category(CategoryCommands::Add {
                name: "Reading".into(),
            }))
            .await;
        assert!(matches!(duplicate, Err(NotesError::ValidationFailed { .. })));
        let reserved = app
            .run(Commands::Category(CategoryCommands::Add {
                name: DEFAULT_CATEGORY.into(),
            }))
            .await;
        assert!(matches!(reserved, Err(NotesError::ValidationFailed { .. })));

        app.run(Commands::Create {
            title: "Dune".into(),
            content: None,
            category: Some("Reading".into()),
            temporary: false,
            edit: false,
        })
        .await
        .unwrap();
        assert!(app.categories.drafts().is_empty());
        assert_eq!(app.categories.names(), vec!["Reading"]);
        assert_eq!(app.categories.count("Reading"), 1);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_reported() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        for command in [
            Commands::Favorite { id: "nope".into() },
            Commands::Restore { id: "nope".into() },
            Commands::View {
                id: "nope".into(),
                json: false,
            },
        ] {
            let result = app.run(command).await;
            assert!(matches!(result, Err(NotesError::NoteNotFound { .. })));
        }
    }

    #[tokio::test]
    async fn test_delete_restore_and_forced_permanent_delete() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.run(Commands::Create {
            title: "Draft".into(),
            content: None,
            category: Some("Work".into()),
            temporary: false,
            edit: false,
        })
        .await
        .unwrap();
        let id = only_note(&app).await.id;

        app.run(Commands::Delete {
            id: id.clone(),
            permanent: false,
            force: false,
        })
        .await
        .unwrap();
        assert!(only_note(&app).await.deleted);
        assert!(app.categories.is_empty());

        app.run(Commands::Restore { id: id.clone() }).await.unwrap();
        assert!(!only_note(&app).await.deleted);

        app.run(Commands::Delete {
            id,
            permanent: true,
            force: true,
        })
        .await
        .unwrap();
        assert!(app.note_storage.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_create_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.run(Commands::Create {
            title: String::new(),
            content: None,
            category: None,
            temporary: false,
            edit: false,
        })
        .await
        .unwrap();
        assert!(app.note_storage.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_settings_command_persists() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.run(Commands::Settings {
            theme: Some("dark".into()),
            accent: Some("#1e90ff".into()),
            jokes: Some(false),
            buddy: None,
        })
        .await
        .unwrap();

        let saved = SettingsStore::new(dir.path().join("settings.json"), dir.path().join("buddies"))
            .load();
        assert_eq!(saved.theme, Theme::Dark);
        assert_eq!(saved.accent_color, "#1E90FF");
        assert!(!saved.amogus_jokes);

        let bad = app
            .run(Commands::Settings {
                theme: Some("neon".into()),
                accent: None,
                jokes: None,
                buddy: None,
            })
            .await;
        assert!(bad.is_err());
    }

    #[test]
    fn test_note_json_includes_id() {
        let note = Note::new("20260101000000000000".into(), "t".into(), "c".into(), Utc::now());
        let value = note_json(&note).unwrap();
        assert_eq!(value["id"], "20260101000000000000");
        assert_eq!(value["title"], "t");
    }
}
