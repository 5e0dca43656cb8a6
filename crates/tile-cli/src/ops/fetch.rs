//! The fetch workflow.
//!
//! 1. Scan the releases directory and keep whatever already satisfies the lockfile.
//! 2. Delete tarballs the lockfile no longer wants, and damaged ones.
//! 3. Resolve the rest across the configured sources.
//! 4. Download every match.

use anyhow::{Context, Result, bail};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tile_core::io::local::{self, LocalRelease};
use tile_core::{Lockfile, ReleaseSource, Reporter, Resolver, Retrieved};
use tile_schema::{LocatedArtifact, ReleaseRequirement};

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub releases_dir: PathBuf,
    /// Parallel sub-transfers per release; `0` uses the transport default.
    pub download_threads: usize,
    pub dry_run: bool,
}

/// A release chosen for download, with the source that holds it.
#[derive(Debug, Clone)]
pub struct Planned {
    pub source: String,
    pub artifact: LocatedArtifact,
}

/// What a fetch did (or, for a dry run, would do).
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Local tarballs that already satisfy the lockfile.
    pub present: Vec<LocalRelease>,
    /// Local tarballs the lockfile does not want.
    pub extras: Vec<LocalRelease>,
    /// Local tarballs that could not be read to the end.
    pub damaged: Vec<PathBuf>,
    pub planned: Vec<Planned>,
    /// Empty for dry runs.
    pub retrieved: Vec<Retrieved>,
}

pub async fn fetch(
    lockfile: &Lockfile,
    sources: Vec<Arc<dyn ReleaseSource>>,
    opts: &FetchOptions,
    reporter: Arc<dyn Reporter>,
) -> Result<FetchReport> {
    let desired = lockfile.requirement();
    let mut report = FetchReport::default();

    reporter.section("Scanning");
    let scan = local::scan(&opts.releases_dir).await?;
    report.damaged = scan.damaged;
    let mut seen = std::collections::HashSet::new();
    for release in scan.releases {
        // A second copy of a satisfied release is as unwanted as a stale one.
        if release.satisfies(&desired) && seen.insert(release.id.clone()) {
            report.present.push(release);
        } else {
            report.extras.push(release);
        }
    }

    for extra in &report.extras {
        reporter.info(&format!(
            "{} extra release {}",
            if opts.dry_run { "Would remove" } else { "Removing" },
            extra.path.display()
        ));
    }
    for damaged in &report.damaged {
        reporter.warning(&format!(
            "{} damaged release {}",
            if opts.dry_run { "Would remove" } else { "Removing" },
            damaged.display()
        ));
    }
    if !opts.dry_run {
        let extras = report.extras.iter().map(|r| r.path.as_path());
        local::delete(extras.chain(report.damaged.iter().map(PathBuf::as_path))).await?;
    }

    let missing = desired.without(report.present.iter().map(|r| &r.id));
    if missing.is_empty() {
        reporter.info("All releases are present");
        return Ok(report);
    }

    reporter.section("Resolving");
    let resolution = Resolver::new(sources)
        .resolve(&missing, lockfile.stemcell.as_ref())
        .await?;
    tracing::debug!("{resolution:?}");

    if !resolution.is_complete() {
        bail!(missing_releases_message(resolution.unmatched()));
    }

    for group in resolution.found() {
        for artifact in group.matched.artifacts() {
            report.planned.push(Planned {
                source: group.source.name().to_string(),
                artifact: artifact.clone(),
            });
        }
    }

    if opts.dry_run {
        return Ok(report);
    }

    tokio::fs::create_dir_all(&opts.releases_dir)
        .await
        .with_context(|| format!("Failed to create {}", opts.releases_dir.display()))?;

    reporter.section("Downloading");
    report.retrieved = resolution
        .retrieve(&opts.releases_dir, opts.download_threads)
        .await?;

    Ok(report)
}

fn missing_releases_message(unmatched: &ReleaseRequirement) -> String {
    let mut msg = String::from("could not find the following releases");
    for (id, stemcell) in unmatched.iter() {
        let _ = match stemcell {
            Some(stemcell) => write!(msg, "\n- {id} (compiled with {stemcell} or built)"),
            None => write!(msg, "\n- {id}"),
        };
    }
    msg
}
