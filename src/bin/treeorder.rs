//! treeorder CLI Binary

use anyhow::Context;
use clap::Parser;
use treeorder::config::ConfigLoader;
use treeorder::logging::init_logging;
use treeorder::tooling::cli::{Cli, CliContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_with_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")?;
    cli.apply_logging_overrides(&mut config.logging);
    init_logging(Some(&config.logging)).context("Failed to initialize logging")?;

    let context = CliContext::from_config(config).context("Failed to initialize order store")?;
    let output = context.execute(&cli.command).await?;
    println!("{}", output);
    Ok(())
}
