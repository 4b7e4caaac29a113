use std::path::PathBuf;

use clap::Parser;

use crate::{Commands, Config, Result};

/// Main CLI application arguments and command structure
#[derive(Parser, Debug)]
#[clap(
    name = "amognotes",
    version,
    about = "Notes with categories, a recycle bin and self-destructing temporary notes"
)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Directory holding notes.json, settings.json and buddies/
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the amognotes application
    #[clap(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Configuration from `--config`, with `--data-dir` taking precedence.
    pub fn resolve_config(&self) -> Result<Config> {
        let config = Config::load_or_default(self.config.as_deref())?;
        Ok(match &self.data_dir {
            Some(data_dir) => config.with_data_dir(data_dir),
            None => config,
        })
    }
}
