#![allow(non_snake_case)]

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use scheduleBot::cli::{self, Cli};
use scheduleBot::config::Settings;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = cli::run(cli, settings).await {
        error!("{}", err);
        std::process::exit(1);
    }
}
