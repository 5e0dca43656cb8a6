//! Release sources.
//!
//! A source is any repository that can answer "which of these releases do
//! you have?" and then deliver the ones it claimed. The resolver only sees
//! the [`ReleaseSource`] trait; buckets and the public index differ in how
//! they enumerate candidates, not in how candidates are judged.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tile_schema::{LocatedArtifact, MatchedSet, ReleaseId, ReleaseRequirement, Stemcell};
use tokio::fs::File;

use crate::error::FetchError;
use crate::io::ObjectDownloader;
use crate::io::download::HttpDownloader;
use crate::io::s3::S3Store;
use crate::lockfile::Lockfile;
use crate::pattern::{ArtifactKind, ReleasePattern};
use crate::reporter::Reporter;

pub mod bucket;
pub mod public_index;

pub use bucket::BucketReleaseSource;
pub use public_index::PublicIndexSource;

#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Short label used in logs and summaries.
    fn name(&self) -> &str;

    /// Find the releases in `desired` this source can provide.
    ///
    /// `stemcell` is the constraint compiled artifacts must match when a
    /// release carries no constraint of its own. Every returned id is a key
    /// of `desired`.
    async fn locate(
        &self,
        desired: &ReleaseRequirement,
        stemcell: Option<&Stemcell>,
    ) -> Result<MatchedSet, FetchError>;

    /// Download every artifact in `matched` into `dest_dir`.
    ///
    /// `concurrency` caps parallel sub-transfers per artifact; `0` selects
    /// the transport default.
    async fn retrieve(
        &self,
        dest_dir: &Path,
        matched: &MatchedSet,
        concurrency: usize,
    ) -> Result<Vec<Retrieved>, FetchError>;
}

/// A release written to the releases directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub id: ReleaseId,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Whether a candidate satisfies the desired set.
///
/// Built candidates (no stemcell) only need a matching id. Compiled
/// candidates must also carry exactly the effective stemcell constraint; a
/// compiled candidate is never accepted when there is no constraint at all.
pub(crate) fn admits(
    desired: &ReleaseRequirement,
    fallback: Option<&Stemcell>,
    id: &ReleaseId,
    stemcell: Option<&Stemcell>,
) -> bool {
    if !desired.contains(id) {
        return false;
    }
    match stemcell {
        None => true,
        Some(found) => desired
            .constraint(id)
            .or(fallback)
            .is_some_and(|required| required == found),
    }
}

/// Sequential artifact retrieval over one transport.
pub struct Retriever {
    downloader: Arc<dyn ObjectDownloader>,
    reporter: Arc<dyn Reporter>,
}

impl Retriever {
    pub fn new(downloader: Arc<dyn ObjectDownloader>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            downloader,
            reporter,
        }
    }

    /// Download each artifact in turn, stopping at the first failure.
    ///
    /// Partially written files from a failed transfer are left in place.
    pub async fn retrieve(
        &self,
        dest_dir: &Path,
        matched: &MatchedSet,
        concurrency: usize,
    ) -> Result<Vec<Retrieved>, FetchError> {
        let parts = match concurrency {
            0 => self.downloader.default_concurrency(),
            n => n,
        };

        let mut retrieved = Vec::with_capacity(matched.len());
        for artifact in matched.artifacts() {
            let path = dest_dir.join(artifact.local_filename());
            let file = File::create(&path)
                .await
                .map_err(|source| FetchError::CreateFile {
                    path: path.clone(),
                    source,
                })?;

            tracing::debug!("Downloading {} to {}", artifact.location(), path.display());
            self.reporter.downloading(artifact);

            let bytes = match self
                .downloader
                .download(artifact.location(), file, &path, parts)
                .await
            {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.reporter.failed(artifact.id(), &e.to_string());
                    return Err(FetchError::Transfer(e));
                }
            };

            self.reporter.done(artifact, bytes);
            retrieved.push(Retrieved {
                id: artifact.id().clone(),
                path,
                bytes,
            });
        }

        Ok(retrieved)
    }
}

/// Record `artifact` unless an earlier one already claimed its id.
pub(crate) fn record_first(
    matched: &mut MatchedSet,
    source: &str,
    reporter: &dyn Reporter,
    artifact: LocatedArtifact,
) {
    if matched.contains(artifact.id()) {
        tracing::warn!(
            "{source}: ignoring duplicate match for {} at {}",
            artifact.id(),
            artifact.location()
        );
        return;
    }
    reporter.located(source, &artifact);
    matched.record(artifact);
}

/// Build the sources a lockfile configures, highest priority first:
/// the compiled bucket, the public index, then the built bucket.
///
/// # Errors
///
/// Returns an error if a configured bucket pattern is invalid.
pub async fn configured_sources(
    lockfile: &Lockfile,
    client: reqwest::Client,
    reporter: Arc<dyn Reporter>,
) -> Result<Vec<Arc<dyn ReleaseSource>>, FetchError> {
    let mut sources: Vec<Arc<dyn ReleaseSource>> = Vec::new();

    if let Some(config) = lockfile.compiled_releases() {
        let pattern = ReleasePattern::new(&config.regex, ArtifactKind::Compiled)?;
        let store = Arc::new(S3Store::from_config(config).await);
        sources.push(Arc::new(
            BucketReleaseSource::new(pattern, store.clone(), store, reporter.clone())
                .with_prefix(config.prefix.clone()),
        ));
    }

    sources.push(Arc::new(PublicIndexSource::new(
        &lockfile.public_index,
        client.clone(),
        Arc::new(HttpDownloader::new(client)),
        reporter.clone(),
    )));

    if let Some(config) = lockfile.built_releases() {
        let pattern = ReleasePattern::new(&config.regex, ArtifactKind::Built)?;
        let store = Arc::new(S3Store::from_config(config).await);
        sources.push(Arc::new(
            BucketReleaseSource::new(pattern, store.clone(), store, reporter)
                .with_prefix(config.prefix.clone()),
        ));
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use crate::testing::FakeDownloader;
    use tile_schema::{BuiltArtifact, CompiledArtifact};

    fn matched() -> MatchedSet {
        [
            LocatedArtifact::Built(BuiltArtifact {
                id: ReleaseId::new("bpm", "1.2.3"),
                location: "2.5/bpm/bpm-1.2.3.tgz".to_string(),
            }),
            LocatedArtifact::Compiled(CompiledArtifact {
                id: ReleaseId::new("uaa", "74.0.0"),
                stemcell: Stemcell::new("ubuntu-trusty", "1234"),
                location: "2.5/uaa/uaa-74.0.0-ubuntu-trusty-1234.tgz".to_string(),
            }),
        ]
        .into_iter()
        .collect()
    }

    fn retriever(downloader: &Arc<FakeDownloader>) -> Retriever {
        Retriever::new(downloader.clone(), Arc::new(NullReporter))
    }

    #[test]
    fn test_admits_built_by_id() {
        let desired = ReleaseRequirement::from_ids([ReleaseId::new("bpm", "1.2.3")], None);
        assert!(admits(&desired, None, &ReleaseId::new("bpm", "1.2.3"), None));
        assert!(!admits(&desired, None, &ReleaseId::new("bpm", "1.2.4"), None));
    }

    #[test]
    fn test_admits_compiled_requires_exact_stemcell() {
        let xenial = Stemcell::new("ubuntu-xenial", "190.0.0");
        let id = ReleaseId::new("bpm", "1.2.3");
        let desired = ReleaseRequirement::from_ids([id.clone()], Some(&xenial));

        assert!(admits(&desired, None, &id, Some(&xenial)));
        assert!(!admits(&desired, None, &id, Some(&Stemcell::new("ubuntu-xenial", "190.0"))));
        assert!(!admits(&desired, None, &id, Some(&Stemcell::new("ubuntu-trusty", "190.0.0"))));
    }

    #[test]
    fn test_admits_falls_back_to_argument_stemcell() {
        let xenial = Stemcell::new("ubuntu-xenial", "190.0.0");
        let id = ReleaseId::new("bpm", "1.2.3");
        let desired = ReleaseRequirement::from_ids([id.clone()], None);

        assert!(admits(&desired, Some(&xenial), &id, Some(&xenial)));
        assert!(!admits(&desired, None, &id, Some(&xenial)));
    }

    #[tokio::test]
    async fn test_retrieve_empty_set_transfers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Arc::new(FakeDownloader::new("bucket"));

        let retrieved = retriever(&downloader)
            .retrieve(dir.path(), &MatchedSet::new(), 3)
            .await
            .unwrap();

        assert!(retrieved.is_empty());
        assert!(downloader.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_forwards_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Arc::new(FakeDownloader::new("bucket"));

        let retrieved = retriever(&downloader)
            .retrieve(dir.path(), &matched(), 3)
            .await
            .unwrap();

        assert_eq!(retrieved.len(), 2);
        assert_eq!(
            downloader.calls(),
            vec![
                ("2.5/bpm/bpm-1.2.3.tgz".to_string(), 3),
                ("2.5/uaa/uaa-74.0.0-ubuntu-trusty-1234.tgz".to_string(), 3),
            ]
        );

        let compiled = dir.path().join("uaa-74.0.0-ubuntu-trusty-1234.tgz");
        assert_eq!(
            std::fs::read_to_string(compiled).unwrap(),
            "bucket/2.5/uaa/uaa-74.0.0-ubuntu-trusty-1234.tgz"
        );
        assert!(dir.path().join("bpm-1.2.3.tgz").exists());
    }

    #[tokio::test]
    async fn test_retrieve_zero_concurrency_uses_transport_default() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Arc::new(FakeDownloader::new("bucket"));

        retriever(&downloader)
            .retrieve(dir.path(), &matched(), 0)
            .await
            .unwrap();

        assert!(downloader.calls().iter().all(|(_, parts)| *parts == 5));
    }

    #[tokio::test]
    async fn test_retrieve_missing_directory_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("non-existent-folder");
        let downloader = Arc::new(FakeDownloader::new("bucket"));

        let err = retriever(&downloader)
            .retrieve(&missing, &matched(), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::CreateFile { .. }));
        assert!(err.to_string().contains("non-existent-folder"), "{err}");
        assert!(downloader.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_transfer_failure() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Arc::new(FakeDownloader::new("bucket").failing("503 Service Unavailable"));

        let err = retriever(&downloader)
            .retrieve(dir.path(), &matched(), 0)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to download file, 503 Service Unavailable"
        );
        // The batch stops at the first failure.
        assert_eq!(downloader.calls().len(), 1);
    }
}
