pub mod error;
pub mod io;
pub mod lockfile;
pub mod pattern;
pub mod resolver;
pub mod source;

pub mod reporter;

#[cfg(test)]
pub(crate) mod testing;

pub use error::FetchError;
pub use lockfile::Lockfile;
pub use reporter::{NullReporter, Reporter};
pub use resolver::{Resolution, Resolver};
pub use source::{ReleaseSource, Retrieved, configured_sources};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("tile-core/", env!("CARGO_PKG_VERSION"));
