//! Deskboard - personal dashboard backend
//!
//! Serves widget layout, settings and cached upstream data (weather,
//! headlines, engineering blog posts, GitHub pull requests) over HTTP.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use deskboard::cli::Cli;
use deskboard::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deskboard=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.apply(Config::load(cli.config.as_deref()));

    deskboard::app::serve(config).await?;
    Ok(())
}
