use clap::Parser;

use crate::{cli::Cli, error::Result};

mod cli;
mod commands;
mod error;
mod export;
mod session;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = settings::load(&cli.global)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "duit={level},engine={level},client={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = commands::run(cli.command, settings).await {
        tracing::error!("{err}");
        return Err(err);
    }
    Ok(())
}
