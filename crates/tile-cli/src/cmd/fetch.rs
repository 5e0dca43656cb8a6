//! Fetch command

use crate::FetchArgs;
use crate::ops::fetch::{self, FetchOptions};
use crate::ui::{ConsoleReporter, summary};
use anyhow::{Context, Result};
use std::sync::Arc;
use tile_core::{Lockfile, Reporter, configured_sources};

/// Download every release the lockfile lists that is not already present.
pub async fn fetch(args: &FetchArgs, dry_run: bool) -> Result<()> {
    let lockfile = Lockfile::load(&args.lockfile).await?;
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new());

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let sources = configured_sources(&lockfile, client, reporter.clone()).await?;
    tracing::debug!(
        "Sources in priority order: {}",
        sources
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let opts = FetchOptions {
        releases_dir: args.releases_directory.clone(),
        download_threads: args.download_threads,
        dry_run,
    };
    let report = fetch::fetch(&lockfile, sources, &opts, reporter).await?;

    println!("{}", summary::render(&report, dry_run));
    Ok(())
}
