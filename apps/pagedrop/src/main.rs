//! pagedrop entry point.

mod app;
mod cli;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    // Stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    let config = config::Config::load()?;
    tracing::debug!(project = %config.project, directory = %config.directory, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let code = rt.block_on(app::run(cli.command, config))?;
    Ok(code)
}
