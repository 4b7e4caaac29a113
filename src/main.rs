use std::process;

use clap::Parser;
use log::{error, info};

use amognotes::{App, Cli};

pub fn initialize_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");

    let result = match cli.resolve_config() {
        Ok(config) => match App::bootstrap(config) {
            Ok(mut app) => app.run(cli.command).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    info!("Application shutting down");
}
