//! Note-taking application library
//!
//! This library provides the note store, the expiry engine for temporary and
//! recycle bin notes, categories, view filters, settings and the background
//! maintenance scheduler behind the `amognotes` binary.

mod categories;
mod cli;
mod config;
mod errors;
mod filter;
mod helper;
mod jokes;
pub mod lifecycle;
mod note;
mod scheduler;
mod settings;
mod storage;
mod types;

// Re-export key components
pub use categories::*;
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use filter::*;
pub use helper::*;
pub use jokes::*;
pub use lifecycle::{Countdown, ExpiryPolicy, DEFAULT_RETENTION_DAYS};
pub use note::*;
pub use scheduler::*;
pub use settings::*;
pub use storage::*;
pub use types::*;
