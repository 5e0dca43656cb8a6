//! tile - release fetching CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tile_cli::cmd;
use tile_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run;

    match cli.command {
        Commands::Fetch(args) => cmd::fetch::fetch(&args, dry_run).await,
    }
}
