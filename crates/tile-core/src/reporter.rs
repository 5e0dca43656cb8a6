//! Reporter trait for dependency injection
//!
//! This trait allows resolution and retrieval to report progress without
//! being coupled to a specific terminal implementation.

use tile_schema::{LocatedArtifact, ReleaseId};

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Resolving").
    fn section(&self, title: &str);

    /// A source matched a release.
    fn located(&self, source: &str, artifact: &LocatedArtifact);

    /// A transfer into the releases directory has started.
    fn downloading(&self, artifact: &LocatedArtifact);

    /// A transfer completed with `bytes` written.
    fn done(&self, artifact: &LocatedArtifact, bytes: u64);

    /// Marks a release as failed with a specific reason.
    fn failed(&self, id: &ReleaseId, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title)
    }
    fn located(&self, source: &str, artifact: &LocatedArtifact) {
        (**self).located(source, artifact)
    }
    fn downloading(&self, artifact: &LocatedArtifact) {
        (**self).downloading(artifact)
    }
    fn done(&self, artifact: &LocatedArtifact, bytes: u64) {
        (**self).done(artifact, bytes)
    }
    fn failed(&self, id: &ReleaseId, reason: &str) {
        (**self).failed(id, reason)
    }
    fn info(&self, msg: &str) {
        (**self).info(msg)
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg)
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn located(&self, _: &str, _: &LocatedArtifact) {}
    fn downloading(&self, _: &LocatedArtifact) {}
    fn done(&self, _: &LocatedArtifact, _: u64) {}
    fn failed(&self, _: &ReleaseId, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
