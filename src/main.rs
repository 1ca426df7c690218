mod cli;
mod config;
mod db;
mod embedding;
mod error;
mod pipeline;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feedsift", version, about = "Classify recent feed messages by embedding similarity")]
struct Cli {
    /// Config file (defaults to ~/.feedsift/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one classification pass and exit
    Run,
    /// Print a database health report
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::FeedsiftConfig::load_from(path)?,
        None => config::FeedsiftConfig::load()?,
    };

    // Log to stderr so stdout carries only the command's report.
    let filter = EnvFilter::try_new(&config.log.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run => cli::run::run(&config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
