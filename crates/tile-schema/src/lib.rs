//! Shared value types for release resolution.
//!
//! A [`ReleaseRequirement`] describes what a tile needs, a [`LocatedArtifact`]
//! describes where one release was found, and a [`MatchedSet`] collects the
//! artifacts found for a requirement.

pub mod artifact;
pub mod release;

// Re-exports
pub use artifact::{BuiltArtifact, CompiledArtifact, LocatedArtifact, MatchedSet};
pub use release::{ReleaseId, ReleaseRequirement, Stemcell, StemcellParseError};

/// File extension used for every release tarball written to disk.
pub const RELEASE_TARBALL_EXT: &str = "tgz";
