//! tile - release fetching for tile builds
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads a lockfile, works out which releases are missing from the releases
//! directory, finds them in the configured repositories and downloads them.
//!
//! # Repositories
//!
//! Releases are looked up in priority order:
//!
//! 1. the compiled release bucket (`[compiled_releases]`), when configured
//! 2. the public release index (`[public_index]`)
//! 3. the built release bucket (`[built_releases]`), when configured

pub mod cmd;
pub mod ops;
pub mod ui;

pub use tile_core::USER_AGENT;
pub use tile_core::lockfile::{DEFAULT_LOCKFILE, Lockfile};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Directory releases are downloaded into when none is given.
pub const DEFAULT_RELEASES_DIR: &str = "releases";

#[derive(Debug, Parser)]
#[command(name = "tile")]
#[command(author, version, about = "tile - build tiles from pinned releases")]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download the releases listed in the lockfile
    Fetch(FetchArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Path to the lockfile
    #[arg(long, env = "TILE_LOCKFILE", default_value = DEFAULT_LOCKFILE)]
    pub lockfile: PathBuf,

    /// Directory to download releases into
    #[arg(long, env = "TILE_RELEASES_DIR", default_value = DEFAULT_RELEASES_DIR)]
    pub releases_directory: PathBuf,

    /// Parallel byte-range transfers per release (0 uses the transport default)
    #[arg(long, default_value_t = 0)]
    pub download_threads: usize,
}
