mod cli;
mod commands;
mod logging;

use clap::Parser;
use redditfeed_core::{AppConfig, CoreError, ErrorExt};
use std::process::ExitCode;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load_validated(&cli.config) {
        Ok(config) => config,
        Err(e) => return fail(&CoreError::from(e)),
    };

    let _log_guard = match logging::init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialise logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("redditfeed {} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Command::Validate => commands::validate(&config).await,
        Command::Once => commands::once(&config).await,
        Command::Run => commands::run(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.log_error();
            fail(&e)
        }
    }
}

fn fail(error: &CoreError) -> ExitCode {
    eprintln!("Error: {}", error.user_friendly_message());
    ExitCode::FAILURE
}
