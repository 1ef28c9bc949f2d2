mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            scenario,
            flow,
            keep,
            output,
        } => commands::run(&scenario, flow, keep, output).await,
        Command::Diff { scenario } => commands::diff(&scenario).await,
        Command::Facts {
            scenario,
            kind,
            name,
            tags,
            output,
        } => commands::facts(&scenario, kind, name, tags, output).await,
        Command::Destroy { scenario, yes } => commands::destroy(&scenario, yes).await,
    }
}
