//! IAM Key Rotator CLI entry point.

use anyhow::Result;
use clap::Parser;

use iam_key_rotator::cli::{commands::rotate, handle_error, Cli};
use iam_key_rotator::infrastructure::config::ConfigLoader;
use iam_key_rotator::infrastructure::logging::LoggerImpl;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => handle_error(err, json),
    }
}

/// Returns `Ok(false)` when at least one profile failed.
async fn run(cli: Cli) -> Result<bool> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    cli.rotate.apply_overrides(&mut config);

    let _logger = LoggerImpl::init(&config.logging, cli.verbose)?;
    tracing::debug!(region = %config.region, apply = cli.rotate.apply, "Configuration loaded");

    let report = rotate::execute(cli.rotate, &config, cli.json).await?;
    Ok(!report.has_failures())
}
