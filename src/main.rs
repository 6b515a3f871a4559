use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use etrade_verifier::config::ExchangerConfig;
use etrade_verifier::exchange::fetch_verifier;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "etrade-verifier")]
#[command(about = "Capture an E-Trade OAuth verification code with a real browser")]
struct Cli {
    /// The authorization URL that starts the flow
    auth_url: String,

    /// E-Trade username
    username: String,

    /// E-Trade password
    password: String,

    /// Path to config file
    #[arg(short, long, default_value = "etrade-verifier.toml")]
    config: PathBuf,

    /// Override the debug screenshot directory
    #[arg(long)]
    screenshot_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // All diagnostics go to stderr; stdout carries nothing but the code so
    // wrapping scripts can capture it.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off",
            )
        }))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ExchangerConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    if let Some(dir) = cli.screenshot_dir {
        config.screenshot_dir = dir;
    }

    match fetch_verifier(&config, &cli.auth_url, &cli.username, &cli.password).await? {
        Some(verifier) => {
            println!("{verifier}");
            Ok(())
        }
        None => {
            tracing::error!("no verification code captured");
            std::process::exit(1);
        }
    }
}
